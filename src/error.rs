//! Error types for catalog generation and update

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// The data directory contained no raster matching the naming contract.
    #[error("no SIF_YYYYMMDD.tif rasters found in {0:?}")]
    NoInputFiles(PathBuf),

    /// Filename does not follow `SIF_YYYYMMDD.tif`.
    #[error("filename {0:?} does not match SIF_YYYYMMDD.tif")]
    MalformedFilename(String),

    /// Raster exists but lacks a decodable geospatial header.
    #[error("raster {path:?} has no usable geospatial header: {reason}")]
    UnreadableRaster { path: PathBuf, reason: String },

    /// Updater invoked before any catalog was built.
    #[error("no catalog found at {0:?}; run `create` first")]
    MissingCatalog(PathBuf),

    #[error(transparent)]
    Gdal(#[from] gdal::errors::GdalError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
