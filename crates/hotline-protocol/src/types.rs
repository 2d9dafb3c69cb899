//! Transaction type and field id assignments.
//!
//! These numbers are the wire contract shared with every existing Hotline
//! client and server; none of them are free to change.

use crate::error::ProtocolError;

/// Operations carried on the control port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum TransactionType {
    Error = 0,
    GetMsgs = 101,
    NewMsg = 102,
    OldPostNews = 103,
    ServerMsg = 104,
    ChatSend = 105,
    ChatMsg = 106,
    Login = 107,
    SendInstantMsg = 108,
    ShowAgreement = 109,
    DisconnectUser = 110,
    DisconnectMsg = 111,
    InviteNewChat = 112,
    InviteToChat = 113,
    RejectChatInvite = 114,
    JoinChat = 115,
    LeaveChat = 116,
    NotifyChatChangeUser = 117,
    NotifyChatDeleteUser = 118,
    NotifyChatSubject = 119,
    SetChatSubject = 120,
    Agreed = 121,
    ServerBanner = 122,
    GetFileNameList = 200,
    DownloadFile = 202,
    UploadFile = 203,
    DeleteFile = 204,
    NewFolder = 205,
    GetFileInfo = 206,
    SetFileInfo = 207,
    MoveFile = 208,
    MakeFileAlias = 209,
    DownloadFolder = 210,
    DownloadInfo = 211,
    DownloadBanner = 212,
    UploadFolder = 213,
    GetUserNameList = 300,
    NotifyChangeUser = 301,
    NotifyDeleteUser = 302,
    GetClientInfoText = 303,
    SetClientUserInfo = 304,
    ListUsers = 348,
    UpdateUser = 349,
    OpenUser = 350,
    NewUser = 351,
    DeleteUser = 352,
    UserBroadcast = 355,
    GetNewsCatNameList = 370,
    GetNewsArtNameList = 371,
    DelNewsItem = 380,
    NewNewsFolder = 381,
    NewNewsCategory = 382,
    GetNewsArtData = 400,
    PostNewsArt = 410,
    DelNewsArt = 411,
    KeepAlive = 500,
}

impl TryFrom<u16> for TransactionType {
    type Error = ProtocolError;

    fn try_from(value: u16) -> Result<Self, ProtocolError> {
        Ok(match value {
            0 => Self::Error,
            101 => Self::GetMsgs,
            102 => Self::NewMsg,
            103 => Self::OldPostNews,
            104 => Self::ServerMsg,
            105 => Self::ChatSend,
            106 => Self::ChatMsg,
            107 => Self::Login,
            108 => Self::SendInstantMsg,
            109 => Self::ShowAgreement,
            110 => Self::DisconnectUser,
            111 => Self::DisconnectMsg,
            112 => Self::InviteNewChat,
            113 => Self::InviteToChat,
            114 => Self::RejectChatInvite,
            115 => Self::JoinChat,
            116 => Self::LeaveChat,
            117 => Self::NotifyChatChangeUser,
            118 => Self::NotifyChatDeleteUser,
            119 => Self::NotifyChatSubject,
            120 => Self::SetChatSubject,
            121 => Self::Agreed,
            122 => Self::ServerBanner,
            200 => Self::GetFileNameList,
            202 => Self::DownloadFile,
            203 => Self::UploadFile,
            204 => Self::DeleteFile,
            205 => Self::NewFolder,
            206 => Self::GetFileInfo,
            207 => Self::SetFileInfo,
            208 => Self::MoveFile,
            209 => Self::MakeFileAlias,
            210 => Self::DownloadFolder,
            211 => Self::DownloadInfo,
            212 => Self::DownloadBanner,
            213 => Self::UploadFolder,
            300 => Self::GetUserNameList,
            301 => Self::NotifyChangeUser,
            302 => Self::NotifyDeleteUser,
            303 => Self::GetClientInfoText,
            304 => Self::SetClientUserInfo,
            348 => Self::ListUsers,
            349 => Self::UpdateUser,
            350 => Self::OpenUser,
            351 => Self::NewUser,
            352 => Self::DeleteUser,
            355 => Self::UserBroadcast,
            370 => Self::GetNewsCatNameList,
            371 => Self::GetNewsArtNameList,
            380 => Self::DelNewsItem,
            381 => Self::NewNewsFolder,
            382 => Self::NewNewsCategory,
            400 => Self::GetNewsArtData,
            410 => Self::PostNewsArt,
            411 => Self::DelNewsArt,
            500 => Self::KeepAlive,
            other => return Err(ProtocolError::UnknownTransactionType(other)),
        })
    }
}

impl TransactionType {
    /// The wire code for this operation
    #[must_use]
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Field type ids shared server-wide
pub mod fields {
    #![allow(missing_docs)]

    pub const ERROR: u16 = 100;
    pub const DATA: u16 = 101;
    pub const USER_NAME: u16 = 102;
    pub const USER_ID: u16 = 103;
    pub const USER_ICON_ID: u16 = 104;
    pub const USER_LOGIN: u16 = 105;
    pub const USER_PASSWORD: u16 = 106;
    pub const REF_NUM: u16 = 107;
    pub const TRANSFER_SIZE: u16 = 108;
    pub const CHAT_OPTIONS: u16 = 109;
    pub const USER_ACCESS: u16 = 110;
    pub const USER_FLAGS: u16 = 112;
    pub const OPTIONS: u16 = 113;
    pub const CHAT_ID: u16 = 114;
    pub const CHAT_SUBJECT: u16 = 115;
    pub const WAITING_COUNT: u16 = 116;
    pub const BANNER_TYPE: u16 = 152;
    pub const NO_SERVER_AGREEMENT: u16 = 154;
    pub const VERSION: u16 = 160;
    pub const COMMUNITY_BANNER_ID: u16 = 161;
    pub const SERVER_NAME: u16 = 162;
    pub const FILE_NAME_WITH_INFO: u16 = 200;
    pub const FILE_NAME: u16 = 201;
    pub const FILE_PATH: u16 = 202;
    pub const FILE_RESUME_DATA: u16 = 203;
    pub const FILE_TRANSFER_OPTIONS: u16 = 204;
    pub const FILE_TYPE_STRING: u16 = 205;
    pub const FILE_CREATOR_STRING: u16 = 206;
    pub const FILE_SIZE: u16 = 207;
    pub const FILE_CREATE_DATE: u16 = 208;
    pub const FILE_MODIFY_DATE: u16 = 209;
    pub const FILE_COMMENT: u16 = 210;
    pub const FILE_NEW_NAME: u16 = 211;
    pub const FILE_NEW_PATH: u16 = 212;
    pub const FILE_TYPE: u16 = 213;
    pub const QUOTING_MSG: u16 = 214;
    pub const AUTOMATIC_RESPONSE: u16 = 215;
    pub const FOLDER_ITEM_COUNT: u16 = 220;
    pub const USER_NAME_WITH_INFO: u16 = 300;
    pub const NEWS_CATEGORY_GUID: u16 = 319;
    pub const NEWS_CATEGORY_LIST_DATA: u16 = 320;
    pub const NEWS_ART_LIST_DATA: u16 = 321;
    pub const NEWS_CAT_NAME: u16 = 322;
    pub const NEWS_CAT_LIST_DATA15: u16 = 323;
    pub const NEWS_PATH: u16 = 325;
    pub const NEWS_ART_ID: u16 = 326;
    pub const NEWS_ART_DATA_FLAV: u16 = 327;
    pub const NEWS_ART_TITLE: u16 = 328;
    pub const NEWS_ART_POSTER: u16 = 329;
    pub const NEWS_ART_DATE: u16 = 330;
    pub const NEWS_ART_PREV_ART: u16 = 331;
    pub const NEWS_ART_NEXT_ART: u16 = 332;
    pub const NEWS_ART_DATA: u16 = 333;
    pub const NEWS_ART_FLAGS: u16 = 334;
    pub const NEWS_ART_PARENT_ART: u16 = 335;
    pub const NEWS_ART_FIRST_CHILD_ART: u16 = 336;
    pub const NEWS_ART_RECURSE_DEL: u16 = 337;
}

/// Next-action codes a folder-transfer client answers with
pub mod next_action {
    /// Transfer the file just announced
    pub const SEND_FILE: u16 = 1;
    /// Resume the file just announced from supplied fork offsets
    pub const RESUME_FILE: u16 = 2;
    /// Skip the file just announced
    pub const NEXT_FILE: u16 = 3;
}
