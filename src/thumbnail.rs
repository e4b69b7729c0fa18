//! Fetching manifest thumbnails and writing them as cover images

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::CoverError;
use crate::filename::with_appended_suffix;
use crate::media::run_with_timeout;

const USER_AGENT: &str = "Mozilla/5.0";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const HTTP_ATTEMPTS: usize = 2;
const CURL_TIMEOUT: Duration = Duration::from_secs(75);
const JPEG_QUALITY: u8 = 90;

/// Download `url`.
///
/// Tries the HTTP client twice, then falls back to `curl`, which copes with
/// some TLS and proxy setups the client rejects. `cover_path` only decides
/// where curl's scratch file goes.
pub fn download(url: &str, cover_path: &Path) -> Result<Vec<u8>, CoverError> {
    let mut last_err = String::new();

    for attempt in 1..=HTTP_ATTEMPTS {
        match fetch_http(url) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                warn!("Thumbnail fetch attempt {} failed for {}: {}", attempt, url, e);
                last_err = e;
            }
        }
    }

    let scratch = with_appended_suffix(cover_path, "curl");
    let result = fetch_with_curl(url, &scratch);
    let _ = fs::remove_file(&scratch);

    result.map_err(|curl_err| {
        debug!("curl fallback failed for {}: {}", url, curl_err);
        CoverError::Download(last_err)
    })
}

fn fetch_http(url: &str) -> Result<Vec<u8>, String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| e.to_string())?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| format!("Request failed: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("HTTP {}: {}", response.status(), url));
    }

    response
        .bytes()
        .map(|b| b.to_vec())
        .map_err(|e| format!("Failed to read response: {}", e))
}

fn fetch_with_curl(url: &str, scratch: &Path) -> Result<Vec<u8>, CoverError> {
    if let Some(parent) = scratch.parent() {
        fs::create_dir_all(parent).map_err(|e| CoverError::io(parent, e))?;
    }

    let mut cmd = Command::new("curl");
    cmd.args([
        "--ssl-no-revoke",
        "-L",
        "--fail",
        "--connect-timeout",
        "10",
        "--max-time",
        "60",
        "-o",
    ])
    .arg(scratch)
    .arg(url);

    let output = run_with_timeout(&mut cmd, CURL_TIMEOUT)
        .map_err(|e| CoverError::Download(format!("curl failed: {}", e)))?;

    if !output.status.success() || !scratch.exists() {
        return Err(CoverError::Download(format!(
            "curl exited with {}",
            output.status
        )));
    }

    fs::read(scratch).map_err(|e| CoverError::io(scratch, e))
}

/// Decode image bytes into an opaque RGB raster; transparency is flattened onto white
pub fn normalize_image(bytes: &[u8]) -> Result<RgbImage, CoverError> {
    let img = image::load_from_memory(bytes)?;
    Ok(flatten_onto_white(&img))
}

fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Write `img` to `path` through a temp file and a rename.
/// PNG for a `.png` destination, JPEG otherwise.
pub fn save_cover(img: &RgbImage, path: &Path) -> Result<(), CoverError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CoverError::io(parent, e))?;
    }

    let tmp = with_appended_suffix(path, "tmp");
    let result = write_encoded(img, path, &tmp)
        .and_then(|()| fs::rename(&tmp, path).map_err(|e| CoverError::io(path, e)));

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_encoded(img: &RgbImage, path: &Path, tmp: &Path) -> Result<(), CoverError> {
    let file = File::create(tmp).map_err(|e| CoverError::io(tmp, e))?;
    let mut writer = BufWriter::new(file);

    let is_png = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"));

    if is_png {
        img.write_to(&mut writer, ImageFormat::Png)?;
    } else {
        JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(img)?;
    }

    writer.flush().map_err(|e| CoverError::io(tmp, e))
}
