pub mod bounding_box;
pub mod mask;
pub mod matting;
pub mod paste;

pub use bounding_box::{crop, BoundingBox, ContentBounds, NOISE_THRESHOLD};
pub use mask::{alpha_channel, apply_alpha, post_process_mask, replace_alpha, soften_alpha};
pub use matting::alpha_matting_cutout;
pub use paste::{paste_with_alpha_mask, to_bottom_position};
