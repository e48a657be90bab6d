use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::imaging::Operation;
use crate::schema::Schema;

/// Discovery record of one tool; serializes as `{name, description, inputSchema}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub schema: Schema,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }
}

pub(crate) fn image_data() -> Schema {
    Schema::string()
        .with_min_length(1)
        .with_description("Base64 encoded image, optionally prefixed with a data URL header")
}

pub(crate) fn recognition_options() -> Schema {
    Schema::object([
        (
            "preprocess",
            Schema::boolean()
                .with_default(json!(true))
                .with_description("Denoise and enhance the image before recognition"),
        ),
        (
            "confidence_threshold",
            Schema::number()
                .with_range(0.0, 1.0)
                .with_default(json!(0.8))
                .with_description("Confidence below this value adds a warning to the result"),
        ),
    ])
}

pub(crate) fn preprocess_options() -> Schema {
    Schema::object([
        (
            "contrast",
            Schema::number()
                .with_range(0.1, 3.0)
                .with_default(json!(1.5))
                .with_description("Contrast factor, 1.0 keeps the original"),
        ),
        (
            "sharpness",
            Schema::number()
                .with_range(0.1, 3.0)
                .with_default(json!(1.2))
                .with_description("Sharpness factor, 1.0 keeps the original"),
        ),
        (
            "max_width",
            Schema::integer()
                .with_range(100.0, 2000.0)
                .with_default(json!(800))
                .with_description("Maximum width in pixels for the resize operation"),
        ),
        (
            "max_height",
            Schema::integer()
                .with_range(100.0, 2000.0)
                .with_default(json!(600))
                .with_description("Maximum height in pixels for the resize operation"),
        ),
        (
            "return_processed_image",
            Schema::boolean()
                .with_default(json!(false))
                .with_description("Include the processed image as base64 PNG"),
        ),
    ])
}

pub(crate) fn operations() -> Schema {
    Schema::array(Schema::string().with_enum(Operation::ALL.iter().map(|op| op.as_str())))
        .with_default(json!(["denoise", "enhance"]))
        .with_description("Operations applied in the given order: denoise, enhance, resize")
}

pub(crate) fn file_path() -> Schema {
    Schema::string()
        .with_min_length(1)
        .with_description("Path of an image file (png, jpg, jpeg, bmp, gif, webp)")
}

pub(crate) fn file_paths(max_items: usize) -> Schema {
    Schema::array(file_path())
        .with_item_bounds(Some(1), Some(max_items))
        .with_description(format!("Image file paths, at most {max_items}"))
}
