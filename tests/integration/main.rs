//! End-to-end tests against a mock TESSA site

mod support;

mod crawl_tests;
mod download_tests;
