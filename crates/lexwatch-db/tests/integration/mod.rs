mod common;
mod document_tests;
mod run_tests;
