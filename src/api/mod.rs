pub mod pagination;
pub mod response;

pub use pagination::{Page, PageQuery, Pagination};
pub use response::{error_response, success_response, success_with_message};
