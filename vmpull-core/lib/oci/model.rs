//! On-the-wire and on-disk data model: layers, manifests, and cached-image metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// One entry in a [`Manifest`]'s layer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// The media type of the layer, used to classify its role (disk, config, nvram, or part).
    #[serde(rename = "mediaType")]
    pub media_type: String,

    /// The content digest of the layer, e.g. `sha256:<hex>`.
    pub digest: String,

    /// The size of the layer in bytes.
    pub size: u64,
}

/// An OCI image manifest as fetched from the registry and cached on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// The manifest schema version, normally `2`.
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,

    /// The manifest's own media type.
    #[serde(rename = "mediaType")]
    pub media_type: String,

    /// The ordered list of layers that make up the image.
    pub layers: Vec<Layer>,

    /// The optional config layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Layer>,
}

/// Metadata recorded alongside a cached manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// The repository name (no tag), e.g. `org/alpine-vm`.
    pub image: String,

    /// The filesystem-safe manifest id this metadata describes.
    #[serde(rename = "manifestId")]
    pub manifest_id: String,

    /// When this cache entry was created.
    pub timestamp: DateTime<Utc>,
}

/// A cached image entry surfaced by the image index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedImage {
    /// The repository name.
    pub repository: String,

    /// The first 12 hex characters of the manifest digest.
    #[serde(rename = "imageId")]
    pub image_id: String,

    /// The full filesystem-safe manifest id.
    #[serde(rename = "manifestId")]
    pub manifest_id: String,
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trips_through_json() {
        let manifest = Manifest {
            schema_version: 2,
            media_type: "application/vnd.oci.image.manifest.v1+json".to_string(),
            layers: vec![Layer {
                media_type: "application/vnd.oci.image.layer.v1.tar".to_string(),
                digest: "sha256:abc".to_string(),
                size: 1000,
            }],
            config: None,
        };

        let encoded = serde_json::to_string(&manifest).unwrap();
        let decoded: Manifest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(manifest, decoded);
    }

    #[test]
    fn layers_are_compared_by_value() {
        let a = Layer {
            media_type: "t".to_string(),
            digest: "sha256:abc".to_string(),
            size: 10,
        };
        let b = a.clone();
        assert_eq!(a, b);
    }
}
