// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for photo capture
//!
//! Heavy work (compositing, mirroring, JPEG encoding) runs off the render
//! loop so the live preview keeps updating while a photo is being taken.
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Camera Frame │ ──▶ │  Photo Pipeline   │ ──▶ │  JPEG data   │
//! │   (RGBA)     │     │  - Mask overlay   │     │     URI      │
//! │              │     │  - Mirror (front) │     │              │
//! │              │     │  - Encoding       │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```

pub mod photo;
