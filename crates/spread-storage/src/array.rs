//! Array store: a chunked-compressed 2-D float field object store, grounded
//! on `storage::object_store::ObjectStorage`'s wrapper around the
//! `object_store` crate, on the local filesystem backend, per DESIGN.md's
//! Open Question resolution (bincode+flate2 framing rather than a full
//! Zarr writer).

use std::io::{Read, Write};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use object_store::{local::LocalFileSystem, path::Path, ObjectStore};
use serde::{Deserialize, Serialize};
use spread_coords::Field;
use tracing::{debug, instrument};

use crate::error::{Result, StorageError};
use crate::traits::ArrayBackend;

/// Wire form of `spread_coords::Field` — `Field` itself carries no
/// `serde` impls since `spread-coords` has no I/O concerns of its own.
#[derive(Serialize, Deserialize)]
enum EncodedField {
    Regular {
        lat_axis: Vec<f64>,
        lon_axis: Vec<f64>,
        values: Vec<f64>,
    },
    Projected {
        lat_2d: Vec<f64>,
        lon_2d: Vec<f64>,
        ny: usize,
        nx: usize,
        values: Vec<f64>,
    },
}

impl From<&Field> for EncodedField {
    fn from(field: &Field) -> Self {
        match field {
            Field::Regular {
                lat_axis,
                lon_axis,
                values,
            } => EncodedField::Regular {
                lat_axis: lat_axis.clone(),
                lon_axis: lon_axis.clone(),
                values: values.clone(),
            },
            Field::Projected {
                lat_2d,
                lon_2d,
                ny,
                nx,
                values,
            } => EncodedField::Projected {
                lat_2d: lat_2d.clone(),
                lon_2d: lon_2d.clone(),
                ny: *ny,
                nx: *nx,
                values: values.clone(),
            },
        }
    }
}

impl TryFrom<EncodedField> for Field {
    type Error = StorageError;

    fn try_from(encoded: EncodedField) -> Result<Self> {
        match encoded {
            EncodedField::Regular {
                lat_axis,
                lon_axis,
                values,
            } => Field::regular(lat_axis, lon_axis, values)
                .map_err(|e| StorageError::Codec(e.to_string())),
            EncodedField::Projected {
                lat_2d,
                lon_2d,
                ny,
                nx,
                values,
            } => Field::projected(lat_2d, lon_2d, ny, nx, values)
                .map_err(|e| StorageError::Codec(e.to_string())),
        }
    }
}

/// Builds the on-disk handle for a field:
/// `{root}/divergence/{YYYYMMDDHH}/{variable}/fhr{NNN}.{array_format}`
/// layout. `NNN` is three-digit zero-padded; `array_format` is the codec
/// extension (`bin.gz`, the bincode+flate2 framing this store uses).
pub fn handle_key(init_time: DateTime<Utc>, variable: &str, lead_hour: u32) -> String {
    format!(
        "divergence/{}/{}/fhr{:03}.bin.gz",
        init_time.format("%Y%m%d%H"),
        variable,
        lead_hour
    )
}

/// Array store client — `put`/`get`/`drop_tree` over a chunked-compressed
/// field codec.
pub struct ArrayStore {
    store: Arc<dyn ObjectStore>,
    root: String,
}

impl ArrayStore {
    /// Opens (creating if absent) a local-filesystem-backed array store
    /// rooted at `root`.
    pub fn new(root: impl Into<String>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StorageError::Codec(e.to_string()))?;
        let store = LocalFileSystem::new_with_prefix(&root)
            .map_err(StorageError::ObjectStore)?;
        Ok(Self {
            store: Arc::new(store),
            root,
        })
    }

    /// Idempotent overwrite: encodes `field` with bincode, gzip-compresses
    /// it, and writes it to `handle_key`. Returns the handle used, so
    /// callers can record it in a `grid_snapshots` row.
    #[instrument(skip(self, field), fields(root = %self.root, handle = %handle_key))]
    pub async fn put(&self, handle_key: &str, field: &Field) -> Result<String> {
        let encoded = EncodedField::from(field);
        let raw = bincode::serialize(&encoded).map_err(|e| StorageError::Codec(e.to_string()))?;

        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(&raw)
            .map_err(|e| StorageError::Codec(e.to_string()))?;
        let compressed = gz.finish().map_err(|e| StorageError::Codec(e.to_string()))?;

        debug!(raw_bytes = raw.len(), compressed_bytes = compressed.len(), "writing field");

        let location = Path::from(handle_key);
        self.store
            .put(&location, Bytes::from(compressed).into())
            .await?;

        Ok(handle_key.to_string())
    }

    /// Reads and decodes the field at `handle`.
    #[instrument(skip(self), fields(root = %self.root, handle = %handle))]
    pub async fn get(&self, handle: &str) -> Result<Field> {
        let location = Path::from(handle);
        let result = self.store.get(&location).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(handle.to_string()),
            other => StorageError::ObjectStore(other),
        })?;
        let compressed = result.bytes().await?;

        let mut raw = Vec::new();
        GzDecoder::new(compressed.as_ref())
            .read_to_end(&mut raw)
            .map_err(|e| StorageError::Codec(e.to_string()))?;

        let encoded: EncodedField =
            bincode::deserialize(&raw).map_err(|e| StorageError::Codec(e.to_string()))?;
        encoded.try_into()
    }

    /// Whether an object exists at `handle`, without reading its body.
    pub async fn exists(&self, handle: &str) -> Result<bool> {
        let location = Path::from(handle);
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::ObjectStore(e)),
        }
    }

    /// Deletes every object under `prefix` — the reset path for sweeping
    /// orphaned objects left by a crash between `put` and the relational
    /// commit.
    #[instrument(skip(self), fields(root = %self.root, prefix = %prefix))]
    pub async fn drop_tree(&self, prefix: &str) -> Result<u64> {
        use futures::TryStreamExt;

        let prefix_path = Path::from(prefix);
        let mut count = 0u64;
        let mut stream = self.store.list(Some(&prefix_path));
        while let Some(meta) = stream.try_next().await? {
            self.store.delete(&meta.location).await?;
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl ArrayBackend for ArrayStore {
    async fn put(&self, handle_key: &str, field: &Field) -> Result<String> {
        ArrayStore::put(self, handle_key, field).await
    }

    async fn get(&self, handle: &str) -> Result<Field> {
        ArrayStore::get(self, handle).await
    }

    async fn exists(&self, handle: &str) -> Result<bool> {
        ArrayStore::exists(self, handle).await
    }

    async fn drop_tree(&self, prefix: &str) -> Result<u64> {
        ArrayStore::drop_tree(self, prefix).await
    }
}
