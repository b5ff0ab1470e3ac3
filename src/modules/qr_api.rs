//! crew QR labels and their upload to object storage.
//!
//! the scan page reads the crew id back out of the QR code; the bib number
//! is drawn over the middle so marshals can also match crews by eye. upload
//! goes to the bucket configured by `STORAGE_URL` / `STORAGE_API_KEY`.
//! everything here is best effort from the caller's point of view: a crew
//! exists with or without its QR url.

use std::env;

use dotenvy::dotenv;
use log::warn;
use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};
use regex::Regex;

use crate::errors::{CustomResult, Error};
use crate::modules::models::crew::Crew;
use diesel::pg::PgConnection;

/// # render a crew QR code as svg with a centered label
/// high error correction leaves room for the label box punched over the
/// middle of the code.
///
/// ## Arguments
/// * `data` - the payload the scanner reads (the crew id)
/// * `label` - short text drawn in the center (the bib number)
///
/// ## Returns
/// * `String` - a complete svg document
pub fn generate_crew_qr(data: &str, label: &str) -> CustomResult<String> {
    let code =
        QrCode::with_error_correction_level(data.as_bytes(), EcLevel::H).map_err(|error| {
            Error::QrCodeError {
                message: error.to_string(),
            }
        })?;

    let image = code
        .render::<svg::Color>()
        .min_dimensions(300, 300)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();

    Ok(overlay_label(&image, label))
}

/// punch a white box over the middle of the svg and draw the label in it.
/// the box is a quarter of the code's width, like the printed cards from
/// earlier editions.
fn overlay_label(image: &str, label: &str) -> String {
    let overlay = format!(
        r##"<rect x="37.5%" y="37.5%" width="25%" height="25%" fill="#ffffff"/><text x="50%" y="50%" dominant-baseline="central" text-anchor="middle" font-family="sans-serif" font-size="11%" fill="#000000">{}</text>"##,
        escape_svg_text(label)
    );

    match image.rfind("</svg>") {
        Some(position) => {
            let mut labeled = image.to_string();
            labeled.insert_str(position, &overlay);
            labeled
        }
        None => image.to_string(),
    }
}

fn escape_svg_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// # upload a rendered QR code to object storage
/// PUT to `{STORAGE_URL}/storage/v1/{filename}` with bearer auth; the
/// object's public url equals the upload url.
pub fn upload_crew_qr(svg_document: &str, filename: &str) -> CustomResult<String> {
    dotenv().ok();

    let storage_url = env::var("STORAGE_URL").map_err(|_| Error::UploadError {
        message: "STORAGE_URL is not set".to_string(),
    })?;
    let api_key = env::var("STORAGE_API_KEY").map_err(|_| Error::UploadError {
        message: "STORAGE_API_KEY is not set".to_string(),
    })?;

    let upload_url = format!("{}/storage/v1/{}", storage_url, filename);

    let client = reqwest::blocking::Client::new();
    let response = client
        .put(&upload_url)
        .header("apikey", &api_key)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "image/svg+xml")
        .body(svg_document.to_string())
        .send()
        .map_err(|error| Error::UploadError {
            message: error.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(Error::UploadError {
            message: format!(
                "{} returned {}: {}",
                upload_url,
                response.status(),
                response.text().unwrap_or_default()
            ),
        });
    }

    Ok(upload_url)
}

/// # generate, upload and store the QR url of a crew
/// failures are logged and swallowed: the crew record is already committed
/// and stays valid without a QR reference.
pub fn attach_qr_code(conn: &mut PgConnection, crew: &Crew) {
    let svg_document = match generate_crew_qr(&crew.id.to_string(), &crew.number) {
        Ok(svg_document) => svg_document,
        Err(error) => {
            warn!(target: "qr_api", "qr generation failed for crew {}: {}", crew.id, error);
            return;
        }
    };

    let filename = format!("{}_{}.svg", sanitize_filename(&crew.name), crew.id);

    match upload_crew_qr(&svg_document, &filename) {
        Ok(public_url) => {
            if let Err(error) = Crew::set_qr_code_url(conn, crew.id, &public_url) {
                warn!(target: "qr_api", "could not store qr url of crew {}: {}", crew.id, error);
            }
        }
        Err(error) => {
            warn!(target: "qr_api", "qr upload failed for crew {}: {}", crew.id, error);
        }
    }
}

/// reduce a crew name to a safe object name
fn sanitize_filename(name: &str) -> String {
    let unsafe_re = Regex::new(r"[^\w\-]+").unwrap();

    unsafe_re.replace_all(name, "_").trim_matches('_').to_string()
}

/**************************************************************************************************/
/**************** TESTS ***************************************************************************/
/**************************************************************************************************/

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_qr_is_svg_with_the_label_inside() {
        let svg_document = generate_crew_qr("42", "07").unwrap();

        assert!(svg_document.starts_with("<?xml") || svg_document.starts_with("<svg"));
        assert!(svg_document.contains(">07</text>"));
        // the label overlay sits inside the document, not after it
        assert!(svg_document.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn labels_are_escaped() {
        let svg_document = generate_crew_qr("42", "a<b&c").unwrap();
        assert!(svg_document.contains("a&lt;b&amp;c"));
    }

    #[test]
    fn filenames_drop_unsafe_characters() {
        assert_eq!(sanitize_filename("Novak & Novakova"), "Novak_Novakova");
        assert_eq!(sanitize_filename("  crew  "), "crew");
    }
}
