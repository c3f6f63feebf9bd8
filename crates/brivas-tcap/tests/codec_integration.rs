//! TCAP Codec Integration Tests
//!
//! Exercises the public API end to end: a MAP short message exchange
//! through the codec facade, both decode paths and configuration loading.

use anyhow::Result;
use brivas_tcap::tcap::context::id;
use brivas_tcap::tcap::AbortSource;
use brivas_tcap::{
    AbortCause, CodecConfig, ComponentType, MessageType, TcapCodec, TcapError, TcapMessage,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("brivas_tcap=trace")
        .with_test_writer()
        .try_init();
}

// MT-ForwardSM
const OP_MT_FORWARD_SM: i64 = 44;
// absentSubscriberSM
const ERR_ABSENT_SUBSCRIBER_SM: i64 = 6;

#[test]
fn test_short_message_dialogue() -> Result<()> {
    init_tracing();
    let codec = TcapCodec::default();

    // MSC opens the dialogue
    let begin = TcapMessage::begin_invoke_with_dialogue(
        0x1000_0001,
        id::SHORT_MSG_MT_RELAY,
        3,
        1,
        OP_MT_FORWARD_SM,
        vec![0x30, 0x03, 0x80, 0x01, 0x07],
    );
    let wire = codec.encode(&begin)?;
    let received = codec.decode(&wire)?;

    assert_eq!(received.message_type(), MessageType::Begin);
    assert_eq!(
        received.application_context_name_with_version().as_deref(),
        Some("shortMsgMT-RelayContext-v3")
    );
    assert_eq!(
        received.application_context_oid().as_deref(),
        Some("0.4.0.0.1.0.25.3")
    );
    let otid = received.otid().map(|t| t.0).unwrap_or_default();

    // Peer accepts and answers with an error
    let end = TcapMessage::end_return_error_with_dialogue(
        otid,
        id::SHORT_MSG_MT_RELAY,
        3,
        1,
        ERR_ABSENT_SUBSCRIBER_SM,
        Vec::new(),
    );
    let wire = codec.encode(&end)?;
    let received = codec.decode(&wire)?;

    assert_eq!(received.message_type(), MessageType::End);
    assert_eq!(received.dtid().map(|t| t.0), Some(0x1000_0001));
    assert_eq!(received.component_types(), vec![ComponentType::ReturnError]);
    assert_eq!(received.invoke_ids(), vec![Some(1)]);
    assert_eq!(received.layer_payloads(), vec![None]);
    assert_eq!(received, end);
    Ok(())
}

#[test]
fn test_paths_agree_on_concatenated_buffer() -> Result<()> {
    init_tracing();
    let codec = TcapCodec::default();

    let messages = vec![
        TcapMessage::begin_invoke(7, 1, 46, vec![0x04, 0x02, 0x11, 0x22]),
        TcapMessage::continue_invoke(8, 7, 2, 46, vec![0xAB]),
        TcapMessage::end_return_result(8, 2, 46, true, vec![0x01]),
        TcapMessage::abort(8, AbortCause::UnrecognizedTransactionId),
        TcapMessage::user_abort(8, AbortSource::DialogueServiceUser),
    ];

    let mut buf = Vec::new();
    for message in &messages {
        buf.extend_from_slice(&codec.encode(message)?);
    }

    let decoded = codec.decode_ber(&buf)?;
    assert_eq!(decoded, messages);
    assert!(decoded[4].abort_cause().is_none());
    assert_eq!(decoded[4].dtid().map(|t| t.0), Some(8));

    // The structured path reads one message and rejects the trailer
    assert!(matches!(
        codec.decode(&buf),
        Err(TcapError::InconsistentLength { .. })
    ));
    Ok(())
}

#[test]
fn test_encode_to_caller_buffer() -> Result<()> {
    let codec = TcapCodec::default();
    let message = TcapMessage::begin_invoke(1, 1, 5, vec![0xAA]);

    let mut dst = [0u8; 64];
    let written = codec.encode_to(&message, &mut dst)?;
    assert_eq!(written, 21);
    assert_eq!(&dst[..2], &[0x62, 0x13]);
    assert_eq!(codec.decode(&dst[..written])?, message);
    Ok(())
}

#[test]
fn test_summary_json() -> Result<()> {
    let message = TcapMessage::begin_invoke_with_dialogue(
        0xCAFE,
        id::SHORT_MSG_GATEWAY,
        3,
        3,
        45,
        vec![0x80, 0x01, 0x00],
    );
    let json = serde_json::to_value(message.summary())?;

    assert_eq!(json["message_type"], "Begin");
    assert_eq!(json["otid"], "0000cafe");
    assert_eq!(json["application_context"], "shortMsgGatewayContext-v3");
    assert_eq!(json["application_context_oid"], "0.4.0.0.1.0.20.3");
    assert_eq!(json["invoke_ids"][0], 3);
    assert_eq!(json["op_codes"][0], 45);
    Ok(())
}

#[test]
fn test_config_from_file() -> Result<()> {
    let path = std::env::temp_dir().join(format!("brivas-tcap-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "max_depth": 4, "strict_length": false }"#)?;

    let config = CodecConfig::from_file(&path.to_string_lossy());
    std::fs::remove_file(&path)?;
    let config = config?;

    assert_eq!(config.max_depth, 4);
    assert!(!config.strict_length);

    // Trailing bytes pass, but a dialogue is too deep for four levels
    let codec = TcapCodec::new(config);
    let mut data =
        brivas_tcap::marshal(&TcapMessage::abort(1, AbortCause::BadlyFormattedTransactionPortion))?
            .to_vec();
    data.push(0x00);
    assert!(codec.decode(&data).is_ok());

    let deep = codec.encode(&TcapMessage::begin_invoke_with_dialogue(
        1,
        id::SHORT_MSG_GATEWAY,
        3,
        1,
        45,
        vec![0x00],
    ))?;
    assert!(matches!(
        codec.decode_ber(&deep),
        Err(TcapError::NestingTooDeep(_))
    ));
    Ok(())
}

#[test]
fn test_config_layers_environment() -> Result<()> {
    std::env::set_var("TCAP_MAX_DEPTH", "12");
    let config = CodecConfig::load(Some("/nonexistent/brivas-tcap"));
    std::env::remove_var("TCAP_MAX_DEPTH");
    let config = config?;

    assert_eq!(config.max_depth, 12);
    assert!(config.strict_length);
    Ok(())
}
