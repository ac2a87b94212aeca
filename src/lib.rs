//! Static STAC catalog generation for daily SIF GeoTIFF rasters.
//!
//! Three cooperating pieces over one on-disk document tree:
//! a GDAL-backed header extractor ([`raster`]), a catalog builder
//! ([`create`]) that writes catalog → collection → items, and an
//! incremental updater ([`update`]) that adds items for new rasters
//! and reconciles the collection extent.

pub mod create;
pub mod error;
pub mod filename;
pub mod raster;
pub mod stac;
pub mod update;

pub use create::{create_catalog, CatalogConfig, CatalogSummary};
pub use error::{CatalogError, Result};
pub use update::{update_catalog, UpdateSummary};
