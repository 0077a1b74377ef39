//! Shared helpers for the admission test suites.

#![allow(dead_code)]

pub mod fixtures;
