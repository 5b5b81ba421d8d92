use eyre::{Context, Result};

/// md5 hex digest of a whole file, computed off the async runtime. md5 is
/// what the remote service reports for stored files, so digests from both
/// sides compare directly.
#[tracing::instrument(skip(file))]
pub async fn hash_file(mut file: std::fs::File) -> Result<String> {
    let (tx, rx) = tokio::sync::oneshot::channel::<std::io::Result<String>>();
    rayon::spawn(move || {
        let mut context = md5::Context::new();
        let res = std::io::copy(&mut file, &mut context)
            .map(|_| format!("{:x}", context.compute()));
        let _ = tx.send(res);
    });
    rx.await
        .wrap_err("could not hash file")?
        .wrap_err("could not hash file")
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}
