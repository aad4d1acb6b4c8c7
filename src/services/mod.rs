pub mod api;
pub mod cache;
pub mod forms;
pub mod html;
pub mod query;
pub mod slug;
