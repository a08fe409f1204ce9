pub mod admin;
pub mod edit_record;
pub mod lab;
pub mod member;
pub mod news;
pub mod paper;
pub mod project;
pub mod research_group;
pub mod resource;
pub mod uploaded_image;

pub use admin::Admin;
pub use edit_record::EditRecord;
pub use lab::Lab;
pub use member::Member;
pub use news::News;
pub use paper::{Paper, PaperAuthor};
pub use project::Project;
pub use research_group::ResearchGroup;
pub use resource::Resource;
pub use uploaded_image::UploadedImage;

/// Soft-delete flag: every row carries `enable` and reads treat 0 as gone.
pub const ENABLED: i16 = 1;
pub const DISABLED: i16 = 0;
