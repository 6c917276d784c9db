//! Wire constants and protocol records
//!
//! Layout of every frame:
//! ┌─────────────────────────────────────────────────────┐
//! │ header_length: i32 BE │ data_length: i32 BE         │
//! ├─────────────────────────────────────────────────────┤
//! │ header: member id, tag, typed fields                │
//! ├─────────────────────────────────────────────────────┤
//! │ data: opaque user payload (max 32KB)                │
//! └─────────────────────────────────────────────────────┘
//!
//! Size ceilings must match the limits compiled into the server.

/// Max destinations (or suspects) in one downcall
pub const DESTS_MAX_SIZE: usize = 10;
pub const PROTOCOL_MAX_SIZE: usize = 256;
pub const GROUP_NAME_MAX_SIZE: usize = 64;
pub const PROPERTIES_MAX_SIZE: usize = 128;
pub const PARAMS_MAX_SIZE: usize = 256;
pub const ENDPT_MAX_SIZE: usize = 48;
pub const ADDR_MAX_SIZE: usize = 48;
pub const PRINCIPAL_MAX_SIZE: usize = 32;
pub const KEY_SIZE: usize = 32;
pub const NAME_MAX_SIZE: usize = ENDPT_MAX_SIZE + 24;
pub const VERSION_MAX_SIZE: usize = 8;
/// Bulk payload ceiling per message
pub const MSG_MAX_SIZE: usize = 32 * 1024;
/// Largest header accepted from the server. A view header grows by about
/// 100 bytes per member, so this fits views of roughly 10,000 members.
pub const HEADER_MAX_SIZE: usize = 1 << 20;

pub const INT_SIZE: usize = 4;
/// `[header_length][data_length]`
pub const FRAME_PREFIX_SIZE: usize = 2 * INT_SIZE;
/// Every header carries at least a member id
pub const MIN_HEADER_SIZE: usize = INT_SIZE;

pub const DEFAULT_PORT: u16 = 5002;

/// Server-to-client notification type
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpType {
    /// A new view was installed
    View = 1,
    /// Multicast delivery
    Cast = 2,
    /// Point-to-point delivery
    Send = 3,
    /// Block request ahead of a view change
    Block = 4,
    /// Member is no longer valid
    Exit = 5,
}

impl UpType {
    #[inline(always)]
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            1 => Some(Self::View),
            2 => Some(Self::Cast),
            3 => Some(Self::Send),
            4 => Some(Self::Block),
            5 => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Client-to-server request type
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnType {
    Join = 1,
    Cast = 2,
    Send = 3,
    Send1 = 4,
    Suspect = 5,
    Leave = 6,
    BlockOk = 7,
}

impl DnType {
    #[inline(always)]
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            1 => Some(Self::Join),
            2 => Some(Self::Cast),
            3 => Some(Self::Send),
            4 => Some(Self::Send1),
            5 => Some(Self::Suspect),
            6 => Some(Self::Leave),
            7 => Some(Self::BlockOk),
            _ => None,
        }
    }
}

/// Identity of a view: logical time plus the leader's endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ViewId {
    pub ltime: i32,
    pub endpt: String,
}

impl ViewId {
    pub fn new(ltime: i32, endpt: impl Into<String>) -> Self {
        Self {
            ltime,
            endpt: endpt.into(),
        }
    }
}

/// Membership snapshot delivered by the server.
///
/// Never mutated after decode; a new view replaces the old one wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    /// Number of members
    pub nmembers: i32,
    /// Server version string
    pub version: String,
    /// Group name
    pub group: String,
    /// Protocol stack in use
    pub proto: String,
    /// Logical time
    pub ltime: i32,
    /// Primary partition?
    pub primary: bool,
    /// Parameters used for this group
    pub parameters: String,
    /// Communication addresses, index-aligned with `view`
    pub address: Vec<String>,
    /// Endpoint names, indexed by rank
    pub view: Vec<String>,
    /// Local endpoint name
    pub endpt: String,
    /// Local address
    pub addr: String,
    /// Local rank
    pub rank: i32,
    /// Group name, fixed for the lifetime of the group
    pub name: String,
    pub view_id: ViewId,
}

impl View {
    /// Endpoint name at `rank`, if the rank is inside this view
    pub fn endpoint(&self, rank: i32) -> Option<&str> {
        usize::try_from(rank)
            .ok()
            .and_then(|r| self.view.get(r))
            .map(String::as_str)
    }
}

/// Parameters for joining a group. Consumed once by Join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOps {
    pub group_name: String,
    /// Colon separated protocol properties
    pub properties: String,
    pub parameters: Option<String>,
    /// Principal name, for secure stacks
    pub principal: Option<String>,
    pub secure: bool,
}

impl JoinOps {
    pub const DEFAULT_PROPERTIES: &'static str = "Gmp:Switch:Sync:Heal:Frag:Suspect:Flow:Slander";

    /// Join `group_name` with the default property list
    pub fn new(group_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            properties: Self::DEFAULT_PROPERTIES.to_string(),
            parameters: None,
            principal: None,
            secure: false,
        }
    }

    pub fn with_properties(mut self, properties: impl Into<String>) -> Self {
        self.properties = properties.into();
        self
    }

    pub fn with_parameters(mut self, parameters: impl Into<String>) -> Self {
        self.parameters = Some(parameters.into());
        self
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_match_server() {
        assert_eq!(UpType::View as i32, 1);
        assert_eq!(UpType::Exit as i32, 5);
        assert_eq!(DnType::Join as i32, 1);
        assert_eq!(DnType::BlockOk as i32, 7);
    }

    #[test]
    fn test_tag_conversion() {
        for v in 1..=5 {
            assert_eq!(UpType::from_i32(v).map(|t| t as i32), Some(v));
        }
        for v in 1..=7 {
            assert_eq!(DnType::from_i32(v).map(|t| t as i32), Some(v));
        }
        assert_eq!(UpType::from_i32(0), None);
        assert_eq!(UpType::from_i32(6), None);
        assert_eq!(DnType::from_i32(8), None);
    }

    #[test]
    fn test_join_ops_defaults() {
        let ops = JoinOps::new("G");
        assert_eq!(ops.properties, JoinOps::DEFAULT_PROPERTIES);
        assert_eq!(ops.parameters, None);
        assert!(!ops.secure);

        let ops = ops.with_principal("alice").secure(true);
        assert_eq!(ops.principal.as_deref(), Some("alice"));
        assert!(ops.secure);
    }

    #[test]
    fn test_view_endpoint_lookup() {
        let view = View {
            nmembers: 2,
            view: vec!["e1".into(), "e2".into()],
            ..Default::default()
        };
        assert_eq!(view.endpoint(1), Some("e2"));
        assert_eq!(view.endpoint(2), None);
        assert_eq!(view.endpoint(-1), None);
    }
}
