//! Pipeline tests against a seeded source checkout and scripted toolchains.

mod common;

mod generate_tests;
