use std::time::Duration;

/// Fixed inter-call delays used to pace remote API usage. Injectable so
/// tests run with zero delay while production runs use real pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub between_uploads: Duration,
    pub between_lookup_batches: Duration,
    pub between_album_chunks: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing {
            between_uploads: Duration::from_millis(1000),
            between_lookup_batches: Duration::from_millis(1000),
            between_album_chunks: Duration::from_millis(500),
        }
    }
}

impl Pacing {
    pub fn none() -> Pacing {
        Pacing {
            between_uploads: Duration::ZERO,
            between_lookup_batches: Duration::ZERO,
            between_album_chunks: Duration::ZERO,
        }
    }

    pub async fn after_upload(&self) {
        pause(self.between_uploads).await;
    }

    pub async fn after_lookup_batch(&self) {
        pause(self.between_lookup_batches).await;
    }

    pub async fn after_album_chunk(&self) {
        pause(self.between_album_chunks).await;
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
