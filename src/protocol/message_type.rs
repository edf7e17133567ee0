//! Message type registry.
//!
//! Every frame header carries a 16-bit code naming the message inside the
//! payload. The mapping is total in both directions: codes that are not in the
//! registry decode to [`MessageType::Unknown`], which keeps the raw code so that
//! `MessageType::from_code(c).code() == c` holds for every `u16`.

use std::fmt;

macro_rules! message_types {
    ($($variant:ident = $code:literal => $name:literal,)*) => {
        /// Type of a signer message, identified on the wire by its header code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum MessageType {
            $(
                #[doc = concat!("`", $name, "` (header code ", stringify!($code), ").")]
                $variant,
            )*
            /// Any header code not in the registry.
            Unknown(u16),
        }

        impl MessageType {
            /// All registered message types, in header code order.
            pub const KNOWN: &'static [MessageType] = &[$(MessageType::$variant,)*];

            /// Look up the type for a wire header code.
            pub fn from_code(code: u16) -> Self {
                match code {
                    $($code => MessageType::$variant,)*
                    other => MessageType::Unknown(other),
                }
            }

            /// Header code written on the wire for this type.
            pub fn code(&self) -> u16 {
                match self {
                    $(MessageType::$variant => $code,)*
                    MessageType::Unknown(code) => *code,
                }
            }

            /// Protocol name of this type.
            pub fn name(&self) -> &'static str {
                match self {
                    $(MessageType::$variant => $name,)*
                    MessageType::Unknown(_) => "UNKNOWN",
                }
            }
        }
    };
}

message_types! {
    Initialize = 0 => "INITIALIZE",
    Ping = 1 => "PING",
    Success = 2 => "SUCCESS",
    Failure = 3 => "FAILURE",
    ChangePin = 4 => "CHANGE_PIN",
    WipeDevice = 5 => "WIPE_DEVICE",
    FirmwareErase = 6 => "FIRMWARE_ERASE",
    FirmwareUpload = 7 => "FIRMWARE_UPLOAD",
    GetEntropy = 9 => "GET_ENTROPY",
    Entropy = 10 => "ENTROPY",
    GetPublicKey = 11 => "GET_PUBLIC_KEY",
    PublicKey = 12 => "PUBLIC_KEY",
    LoadDevice = 13 => "LOAD_DEVICE",
    ResetDevice = 14 => "RESET_DEVICE",
    SignTx = 15 => "SIGN_TX",
    SimpleSignTx = 16 => "SIMPLE_SIGN_TX",
    Features = 17 => "FEATURES",
    PinMatrixRequest = 18 => "PIN_MATRIX_REQUEST",
    PinMatrixAck = 19 => "PIN_MATRIX_ACK",
    Cancel = 20 => "CANCEL",
    TxRequest = 21 => "TX_REQUEST",
    TxAck = 22 => "TX_ACK",
    CipherKeyValue = 23 => "CIPHER_KEY_VALUE",
    ClearSession = 24 => "CLEAR_SESSION",
    ApplySettings = 25 => "APPLY_SETTINGS",
    ButtonRequest = 26 => "BUTTON_REQUEST",
    ButtonAck = 27 => "BUTTON_ACK",
    GetAddress = 29 => "GET_ADDRESS",
    Address = 30 => "ADDRESS",
    EntropyRequest = 35 => "ENTROPY_REQUEST",
    EntropyAck = 36 => "ENTROPY_ACK",
    SignMessage = 38 => "SIGN_MESSAGE",
    VerifyMessage = 39 => "VERIFY_MESSAGE",
    MessageSignature = 40 => "MESSAGE_SIGNATURE",
    PassphraseRequest = 41 => "PASSPHRASE_REQUEST",
    PassphraseAck = 42 => "PASSPHRASE_ACK",
    DebugLinkDecision = 100 => "DEBUG_LINK_DECISION",
    DebugLinkGetState = 101 => "DEBUG_LINK_GET_STATE",
    DebugLinkState = 102 => "DEBUG_LINK_STATE",
    DebugLinkStop = 103 => "DEBUG_LINK_STOP",
    DebugLinkLog = 104 => "DEBUG_LINK_LOG",
}

impl MessageType {
    /// Check if this code is outside the registry.
    #[inline]
    pub fn is_unknown(&self) -> bool {
        matches!(self, MessageType::Unknown(_))
    }
}

impl From<u16> for MessageType {
    fn from(code: u16) -> Self {
        MessageType::from_code(code)
    }
}

impl From<MessageType> for u16 {
    fn from(message_type: MessageType) -> Self {
        message_type.code()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Unknown(code) => write!(f, "UNKNOWN({})", code),
            known => f.write_str(known.name()),
        }
    }
}
