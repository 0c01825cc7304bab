use crate::error::MessageError;
use crate::queue::QueueMessage;
use crate::types::Fragment;

pub const ORDER_ATTRIBUTE: &str = "order_no";
pub const WORD_ATTRIBUTE: &str = "word";

/// Extract the fragment and receipt handle from a received message.
///
/// All three parts are required; nothing is captured from a message that
/// lacks any of them.
pub fn fragment_from_message(message: &QueueMessage) -> Result<(Fragment, &str), MessageError> {
    let receipt_handle = message.receipt_handle()?;
    let order_key = message.string_attribute(ORDER_ATTRIBUTE)?;
    let word = message.string_attribute(WORD_ATTRIBUTE)?;

    let fragment = Fragment {
        order_key: order_key.to_string(),
        word: word.to_string(),
    };
    Ok((fragment, receipt_handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{fragment_message, message};

    #[test]
    fn test_well_formed_message() {
        let msg = fragment_message("rh-1", "4", "quick");
        let (fragment, receipt) = fragment_from_message(&msg).unwrap();
        assert_eq!(fragment.order_key, "4");
        assert_eq!(fragment.word, "quick");
        assert_eq!(receipt, "rh-1");
    }

    #[test]
    fn test_missing_word() {
        let msg = message("rh-1", Some("4"), None);
        assert_eq!(
            fragment_from_message(&msg).unwrap_err(),
            MessageError::MissingAttribute { name: "word" }
        );
    }

    #[test]
    fn test_missing_order() {
        let msg = message("rh-1", None, Some("quick"));
        assert_eq!(
            fragment_from_message(&msg).unwrap_err(),
            MessageError::MissingAttribute { name: "order_no" }
        );
    }

    #[test]
    fn test_missing_receipt_handle() {
        let mut msg = fragment_message("rh-1", "4", "quick");
        msg.receipt_handle = None;
        assert_eq!(
            fragment_from_message(&msg).unwrap_err(),
            MessageError::MissingReceiptHandle
        );
    }
}
