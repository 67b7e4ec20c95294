//! Submission flow: encode → persist → publish → remote store.

use shared_types::{PrivacyMode, PublicKey};
use sr_02_payload_store::{RecordStatus, TransactionStore};
use sr_03_payload_codec::EncodePayloadRequest;
use sr_05_transaction_manager::TransactionManagerError;

use crate::common::{test_node, Network};

fn key(byte: u8) -> PublicKey {
    PublicKey::new([byte; 32])
}

#[tokio::test]
async fn submission_reaches_the_recipient_and_decrypts_there() {
    let network = Network::new();
    let receiver = test_node(&network, key(2), "http://b", &[]);
    let sender = test_node(&network, key(1), "http://a", &[(key(2), "http://b")]);

    let hash = sender
        .manager
        .store(EncodePayloadRequest::standard(
            b"private tx".to_vec(),
            key(1),
            vec![key(2)],
        ))
        .await
        .unwrap();

    // Both stores hold the record under the same content address.
    assert!(sender.state.store.exists(&hash).unwrap());
    assert!(receiver.state.store.exists(&hash).unwrap());

    // The recipient decrypts through its own recipient box.
    let received = receiver.manager.retrieve(&hash).await.unwrap();
    assert_eq!(received.plaintext, b"private tx");
    assert_eq!(received.sender, key(1));
}

#[tokio::test]
async fn duplicate_submissions_collapse_to_one_record_everywhere() {
    let network = Network::new();
    let receiver = test_node(&network, key(2), "http://b", &[]);
    let sender = test_node(&network, key(1), "http://a", &[(key(2), "http://b")]);

    let request = || EncodePayloadRequest::standard(b"same tx".to_vec(), key(1), vec![key(2)]);
    let h1 = sender.manager.store(request()).await.unwrap();
    let h2 = sender.manager.store(request()).await.unwrap();

    assert_eq!(h1, h2);
    assert_eq!(sender.state.store.count().unwrap(), 1);
    assert_eq!(receiver.state.store.count().unwrap(), 1);
}

#[tokio::test]
async fn unreachable_mandatory_recipient_fails_but_keeps_the_local_record() {
    let network = Network::new();
    let reachable = test_node(&network, key(2), "http://b", &[]);
    // key(3) maps to an endpoint nobody serves.
    let sender = test_node(
        &network,
        key(1),
        "http://a",
        &[(key(2), "http://b"), (key(3), "http://dead")],
    );

    let mut request =
        EncodePayloadRequest::standard(b"tx1".to_vec(), key(1), vec![key(2), key(3)]);
    request.privacy_mode = PrivacyMode::MandatoryRecipients;
    request.mandatory_recipients = vec![key(3)];

    let err = sender.manager.store(request).await.unwrap_err();
    let TransactionManagerError::MandatoryDeliveryFailed { hash, failed } = err else {
        panic!("expected mandatory delivery failure");
    };
    assert_eq!(failed, vec![key(3)]);

    // The local copy survives, marked unconfirmed.
    let record = sender.state.store.get(&hash).unwrap().unwrap();
    assert_eq!(record.status, RecordStatus::Unconfirmed);
    // The best-effort recipient was still served.
    assert!(reachable.state.store.exists(&hash).unwrap());
}

#[tokio::test]
async fn best_effort_failure_never_fails_the_submission() {
    let network = Network::new();
    let sender = test_node(&network, key(1), "http://a", &[(key(2), "http://dead")]);

    let hash = sender
        .manager
        .store(EncodePayloadRequest::standard(
            b"tx2".to_vec(),
            key(1),
            vec![key(2)],
        ))
        .await
        .unwrap();
    assert!(sender.state.store.exists(&hash).unwrap());
}
