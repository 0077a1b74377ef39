// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the admission engine.
//!
//! These tests drive whole requests through the [`Admitter`] (and, for the
//! review tests, through the webhook handler) against an in-memory cluster
//! state. No Kubernetes cluster is required.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_flavor_with_two_default_profiles
//! ```
//!
//! ## Test Categories
//!
//! - **Scenario tests**: end-to-end decisions for each resource kind
//! - **Review tests**: AdmissionReview in, AdmissionReview out
//! - **Manifest tests**: realistic YAML manifests from `tests/fixtures`
//!
//! [`Admitter`]: virt_admission::webhooks::Admitter

#[path = "../common/mod.rs"]
mod common;

mod manifest_tests;
mod review_tests;
mod scenario_tests;
