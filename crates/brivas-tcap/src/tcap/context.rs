//! MAP application contexts
//!
//! 3GPP TS 29.002 application-context names share the prefix
//! `0.4.0.0.1.0`, followed by the context identifier and its version.

/// Arcs shared by every MAP application-context name
pub const MAP_AC_PREFIX: &[u32] = &[0, 4, 0, 0, 1, 0];

/// SMS Gateway Context v3
pub const SHORT_MSG_GATEWAY_V3: &[u32] = &[0, 4, 0, 0, 1, 0, 20, 3];
/// SMS MO Relay Context v3
pub const SHORT_MSG_MO_RELAY_V3: &[u32] = &[0, 4, 0, 0, 1, 0, 21, 3];
/// SMS MT Relay Context v3
pub const SHORT_MSG_MT_RELAY_V3: &[u32] = &[0, 4, 0, 0, 1, 0, 25, 3];
/// USSD Network Initiated v2
pub const NETWORK_USSD_V2: &[u32] = &[0, 4, 0, 0, 1, 0, 19, 2];

/// Context identifiers used by the SMS and USSD services
pub mod id {
    pub const NETWORK_UNSTRUCTURED_SS: u8 = 19;
    pub const SHORT_MSG_GATEWAY: u8 = 20;
    pub const SHORT_MSG_MO_RELAY: u8 = 21;
    pub const SHORT_MSG_MT_RELAY: u8 = 25;
}

/// Name of a MAP application context identifier
pub fn context_name(id: u8) -> Option<&'static str> {
    let name = match id {
        1 => "networkLocUpContext",
        2 => "locationCancellationContext",
        3 => "roamingNumberEnquiryContext",
        4 => "istAlertingContext",
        5 => "locationInfoRetrievalContext",
        6 => "callControlTransferContext",
        7 => "reportingContext",
        8 => "callCompletionContext",
        9 => "serviceTerminationContext",
        10 => "resetContext",
        11 => "handoverControlContext",
        12 => "sIWFSAllocationContext",
        13 => "equipmentMngtContext",
        14 => "infoRetrievalContext",
        15 => "interVlrInfoRetrievalContext",
        16 => "subscriberDataMngtContext",
        17 => "tracingContext",
        18 => "networkFunctionalSsContext",
        19 => "networkUnstructuredSsContext",
        20 => "shortMsgGatewayContext",
        21 => "shortMsgMO-RelayContext",
        23 => "shortMsgAlertContext",
        24 => "mwdMngtContext",
        25 => "shortMsgMT-RelayContext",
        26 => "imsiRetrievalContext",
        27 => "msPurgingContext",
        28 => "subscriberInfoEnquiryContext",
        29 => "anyTimeInfoEnquiryContext",
        31 => "groupCallControlContext",
        32 => "gprsLocationUpdateContext",
        33 => "gprsLocationInfoRetrievalContext",
        34 => "failureReportContext",
        35 => "gprsNotifyContext",
        36 => "ss-InvocationNotificationContext",
        37 => "locationSvcGatewayContext",
        38 => "locationSvcEnquiryContext",
        39 => "authenticationFailureReportContext",
        41 => "shortMsgMT-Relay-VGCS-Context",
        42 => "mm-EventReportingContext",
        43 => "anyTimeInfoHandlingContext",
        44 => "resourceManagementContext",
        45 => "groupCallInfoRetrievalContext",
        46 => "vcsgLocationUpdateContext",
        47 => "vcsgLocationCancellationContext",
        _ => return None,
    };
    Some(name)
}
