pub mod album;
pub mod db;
pub mod db_entity;
pub mod photo;
#[allow(non_snake_case)]
mod schema;
#[cfg(test)]
mod test;
#[cfg(test)]
pub(crate) mod test_support;

#[macro_export]
macro_rules! interact {
    ($conn:ident, $block:expr) => {
        tracing::Instrument::in_current_span(<_ as futures::TryFutureExt>::map_err(
            $conn.interact::<_, eyre::Result<_>>($block),
            |err| match err {
                deadpool_diesel::InteractError::Panic(_) => {
                    eyre::eyre!("database interaction panicked")
                }
                deadpool_diesel::InteractError::Aborted => {
                    eyre::eyre!("database interaction was aborted")
                }
            },
        ))
    };
}
