//! HTTP-level scenarios for the welcome page.

mod bootstrap;
mod pages;
mod resources;
