mod common;

pub mod dependency_tests;
