mod health;
mod links;
mod metrics;
mod pages;

pub use health::health_handler;
pub use links::{create_link, delete_link, reorder_links, update_link};
pub use metrics::metrics_handler;
pub use pages::{
    attach_page, create_page, delete_page, list_pages, reorder_pages, update_page, view_page,
};
