//! Shared test fixtures.

use image::{ImageEncoder, RgbImage};

/// Encode a synthetic gradient PNG of the given size.
pub fn test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            96,
        ])
    });
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .expect("encode test png");
    out
}

/// Build a multipart/form-data body with one file part plus text fields.
/// Returns `(content_type, body)`.
pub fn multipart_body(
    file_field: &str,
    filename: &str,
    bytes: &[u8],
    fields: &[(&str, &str)],
) -> (String, Vec<u8>) {
    const BOUNDARY: &str = "inkframe-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{file_field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

/// Mock JSON for a Met search result page.
pub fn met_search_page(ids: &[u64]) -> serde_json::Value {
    serde_json::json!({ "total": ids.len(), "objectIDs": ids })
}

/// Mock JSON for one Met object record.
pub fn met_object(id: u64, title: &str, artist: &str, date: &str) -> serde_json::Value {
    serde_json::json!({
        "objectID": id,
        "title": title,
        "artistDisplayName": artist,
        "objectDate": date,
        "primaryImage": format!("https://images.example/met/{id}.jpg"),
        "primaryImageSmall": format!("https://images.example/met/{id}-small.jpg"),
        "department": "European Paintings",
        "classification": "Paintings",
        "isPublicDomain": true
    })
}

/// Mock JSON for an Art Institute of Chicago search page.
pub fn artic_search_page(items: &[(u64, &str, &str)]) -> serde_json::Value {
    let data: Vec<serde_json::Value> = items
        .iter()
        .map(|(id, title, artist)| {
            serde_json::json!({
                "id": id,
                "title": title,
                "artist_display": artist,
                "date_display": "1888",
                "image_id": format!("img-{id}"),
                "department_title": "Painting and Sculpture of Europe",
                "is_public_domain": true
            })
        })
        .collect();
    serde_json::json!({ "data": data, "config": { "iiif_url": "https://iiif.example" } })
}
