//! Owner channel trait.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// Where background work reports back to its owner.
///
/// # Example Implementation
///
/// ```
/// use async_trait::async_trait;
/// use skillclaw::channels::OwnerChannel;
/// use skillclaw::error::Result;
///
/// struct Stdout;
///
/// #[async_trait]
/// impl OwnerChannel for Stdout {
///     async fn notify(&self, text: &str) -> Result<()> {
///         println!("{}", text);
///         Ok(())
///     }
///
///     async fn deliver_file(&self, path: &str, name: &str) -> Result<()> {
///         println!("file {} at {}", name, path);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait OwnerChannel: Send + Sync {
    /// Push a text notice to the owner.
    async fn notify(&self, text: &str) -> Result<()>;

    /// Send a finished file to the owner.
    ///
    /// # Arguments
    /// * `path` - Absolute path of the file
    /// * `name` - File name shown to the owner
    async fn deliver_file(&self, path: &str, name: &str) -> Result<()>;
}

/// Final path component, or the whole path if it has none.
pub fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_of() {
        assert_eq!(file_name_of("/tmp/out/deck.pptx"), "deck.pptx");
        assert_eq!(file_name_of("report.pdf"), "report.pdf");
        assert_eq!(file_name_of(""), "");
    }
}
