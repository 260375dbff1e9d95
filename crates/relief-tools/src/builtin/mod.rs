pub mod page;
pub mod scrape_website;
pub mod web_search;
pub mod website_search;

pub use scrape_website::ScrapeWebsiteTool;
pub use web_search::WebSearchTool;
pub use website_search::WebsiteSearchTool;
