use crate::id::BlobId;

/// Marker the truncation notice always contains. Streaming payloads carry
/// the pre-truncation content and therefore never contain it.
pub const TRUNCATION_MARKER: &str = "... [truncated ";

/// Render the literal truncation notice appended to an offloaded tool
/// result. `bytes_removed` is the count of bytes dropped from the persisted
/// copy; the full content lives in the blob.
pub fn format_truncation_notice(bytes_removed: usize, blob_id: &BlobId) -> String {
    format!(
        "\n\n... [truncated {bytes_removed} bytes \u{2192} {blob_id}]\n[Use Remember tool with action \"read_blob\" and blob_id \"{blob_id}\" to retrieve full content]"
    )
}

/// Whether a persisted tool-result content string carries a truncation
/// notice.
pub fn is_truncated(content: &str) -> bool {
    content.contains(TRUNCATION_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_contains_blob_id_and_byte_count() {
        let blob_id = BlobId::from_hash("abcdef0123456789");
        let notice = format_truncation_notice(92_160, &blob_id);
        assert!(notice.contains("truncated 92160 bytes"));
        assert!(notice.contains("blob_abcdef012345"));
        assert!(notice.contains("read_blob"));
        assert!(is_truncated(&notice));
    }

    #[test]
    fn plain_content_is_not_truncated() {
        assert!(!is_truncated("ordinary tool output"));
        assert!(!is_truncated(""));
    }
}
