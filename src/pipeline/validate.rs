//! Input validation: type and size constraints checked before any I/O.

use crate::error::RejectReason;
use crate::pipeline::input::{InputDocument, PDF_MEDIA_TYPE};

/// Largest accepted document: 10 MiB. A file of exactly this size passes.
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Check a candidate file's declared media type and size.
///
/// The type is checked first, so a non-PDF is `WrongType` whatever its size.
/// Media type parameters (`; charset=…`) and letter case are ignored.
pub fn validate(size: u64, media_type: &str) -> Result<(), RejectReason> {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if essence != PDF_MEDIA_TYPE {
        return Err(RejectReason::WrongType {
            media_type: media_type.to_string(),
        });
    }
    if size > MAX_FILE_BYTES {
        return Err(RejectReason::TooLarge {
            size,
            limit: MAX_FILE_BYTES,
        });
    }
    Ok(())
}

/// [`validate`] applied to a resolved document.
pub fn validate_document(doc: &InputDocument) -> Result<(), RejectReason> {
    validate(doc.size(), doc.media_type())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_exactly_at_the_boundary() {
        assert_eq!(validate(MAX_FILE_BYTES, PDF_MEDIA_TYPE), Ok(()));
        assert_eq!(validate(0, PDF_MEDIA_TYPE), Ok(()));
    }

    #[test]
    fn rejects_one_byte_over() {
        assert_eq!(
            validate(MAX_FILE_BYTES + 1, PDF_MEDIA_TYPE),
            Err(RejectReason::TooLarge {
                size: MAX_FILE_BYTES + 1,
                limit: MAX_FILE_BYTES,
            })
        );
    }

    #[test]
    fn size_sweep_rejects_iff_over_limit() {
        let step = MAX_FILE_BYTES / 64;
        for size in (0..=MAX_FILE_BYTES * 2).step_by(step as usize) {
            let rejected = validate(size, PDF_MEDIA_TYPE).is_err();
            assert_eq!(rejected, size > MAX_FILE_BYTES, "size {size}");
        }
    }

    #[test]
    fn wrong_type_regardless_of_size() {
        for media_type in ["text/plain", "image/png", "", "application/pdfx"] {
            for size in [0, MAX_FILE_BYTES, MAX_FILE_BYTES * 3] {
                assert!(
                    matches!(validate(size, media_type), Err(RejectReason::WrongType { .. })),
                    "{media_type} / {size}"
                );
            }
        }
    }

    #[test]
    fn ignores_case_and_parameters() {
        assert_eq!(validate(1, "Application/PDF"), Ok(()));
        assert_eq!(validate(1, "application/pdf; charset=binary"), Ok(()));
    }
}
