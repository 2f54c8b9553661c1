// SPDX-License-Identifier: MPL-2.0

//! Media representations shared by the capture and publish paths
//!
//! Captured photos travel between screens and over the API as image data
//! URIs. The [`data_uri`] module parses and builds them.

pub mod data_uri;

pub use data_uri::{DataUriError, ImageDataUri, encode_data_uri, is_image_data_uri};
