//! Service façade: sign requests, fingerprints, wire encoding

use cosi_core::service::{self, SignResponse};
use cosi_core::suite::{self, Point, Scalar};
use cosi_core::Error;
use rand::rngs::OsRng;

fn gen_keys(count: usize) -> (Vec<Scalar>, Vec<Point>) {
    let privates: Vec<Scalar> = (0..count).map(|_| Scalar::random(&mut OsRng)).collect();
    let publics = privates.iter().map(Point::mul_base).collect();
    (privates, publics)
}

#[tokio::test]
async fn signed_message_verifies() {
    let (privates, publics) = gen_keys(2);
    let message = b"hello cosi service";
    let response = service::sign_local(&privates, &publics, message)
        .await
        .unwrap();
    response.verify(&publics, message).unwrap();

    // sum is the double digest of the message
    assert_eq!(
        response.sum,
        suite::digest(&suite::digest(message)).to_vec()
    );
    assert_eq!(response.signature.len(), 64);
}

#[tokio::test]
async fn single_server_roster() {
    let (privates, publics) = gen_keys(1);
    let response = service::sign_local(&privates, &publics, b"verification")
        .await
        .unwrap();
    response.verify(&publics, b"verification").unwrap();
}

#[tokio::test]
async fn parallel_requests_are_independent() {
    let (privates, publics) = gen_keys(2);
    let message = b"hello cosi service";
    let (first, second) = tokio::join!(
        service::sign_local(&privates, &publics, message),
        service::sign_local(&privates, &publics, message),
    );
    first.unwrap().verify(&publics, message).unwrap();
    second.unwrap().verify(&publics, message).unwrap();
}

#[tokio::test]
async fn file_round_trip_detects_corruption() {
    let (privates, publics) = gen_keys(3);
    let content = vec![0u8; 10 * 1024];
    let response = service::sign_local(&privates, &publics, &content)
        .await
        .unwrap();
    response.verify(&publics, &content).unwrap();

    // JSON wire form round-trips
    let json = serde_json::to_string(&response).unwrap();
    let decoded: SignResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, response);
    decoded.verify(&publics, &content).unwrap();

    // a corrupted file fails the sum check
    let mut corrupted = content.clone();
    corrupted[2026] ^= 0x40;
    assert!(matches!(
        response.verify(&publics, &corrupted),
        Err(Error::HashMismatch)
    ));

    // a corrupted signature fails the verification equation
    let mut bad_signature = response.clone();
    bad_signature.signature[7] ^= 0x01;
    assert!(matches!(
        bad_signature.verify(&publics, &content),
        Err(Error::SignatureInvalid | Error::ScalarEncoding)
    ));
}

#[tokio::test]
async fn wire_form_is_two_base64_fields() {
    let (privates, publics) = gen_keys(1);
    let response = service::sign_local(&privates, &publics, b"x").await.unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&serde_json::to_string(&response).unwrap()).unwrap();
    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert!(object["sum"].is_string());
    assert!(object["signature"].is_string());
}

#[tokio::test]
async fn mismatched_key_counts_rejected() {
    let (privates, _) = gen_keys(2);
    let (_, publics) = gen_keys(3);
    assert!(service::sign_local(&privates, &publics, b"x").await.is_err());
}
