//! Typed downcalls and upcalls on top of the codec
//!
//! Every header starts with `member_id, tag`. The typed fields follow; the
//! user payload of Cast/Send/Send1 travels in the frame's data section and
//! is not part of the header.
//!
//! Both directions are implemented. The client encodes downcalls and
//! decodes upcalls; the inverse pair lets tests and simulators play the
//! server side.

use super::codec::{Decoder, Encoder};
use super::message::{
    DnType, JoinOps, UpType, View, ADDR_MAX_SIZE, ENDPT_MAX_SIZE, GROUP_NAME_MAX_SIZE,
    NAME_MAX_SIZE, PARAMS_MAX_SIZE, PRINCIPAL_MAX_SIZE, PROPERTIES_MAX_SIZE, PROTOCOL_MAX_SIZE,
    VERSION_MAX_SIZE,
};
use crate::error::{PreconditionError, ProtocolError};

/// Client-to-server request, without its payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Downcall {
    Join(JoinOps),
    Cast,
    /// Point-to-point to a list of ranks
    Send(Vec<i32>),
    Send1(i32),
    Suspect(Vec<i32>),
    Leave,
    BlockOk,
}

impl Downcall {
    pub fn dn_type(&self) -> DnType {
        match self {
            Downcall::Join(_) => DnType::Join,
            Downcall::Cast => DnType::Cast,
            Downcall::Send(_) => DnType::Send,
            Downcall::Send1(_) => DnType::Send1,
            Downcall::Suspect(_) => DnType::Suspect,
            Downcall::Leave => DnType::Leave,
            Downcall::BlockOk => DnType::BlockOk,
        }
    }
}

/// Server-to-client notification, without its payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upcall {
    View(View),
    Cast { origin: i32 },
    Send { origin: i32 },
    Block,
    Exit,
}

impl Upcall {
    pub fn up_type(&self) -> UpType {
        match self {
            Upcall::View(_) => UpType::View,
            Upcall::Cast { .. } => UpType::Cast,
            Upcall::Send { .. } => UpType::Send,
            Upcall::Block => UpType::Block,
            Upcall::Exit => UpType::Exit,
        }
    }
}

fn check_string(
    field: &'static str,
    s: Option<&str>,
    max: usize,
) -> Result<(), PreconditionError> {
    let Some(s) = s else {
        return Ok(());
    };
    if !s.is_ascii() {
        return Err(PreconditionError::NotSingleByte { field });
    }
    if s.len() > max {
        return Err(PreconditionError::StringTooLong {
            field,
            len: s.len(),
            max,
        });
    }
    Ok(())
}

/// Reject join options the server would refuse, before anything is staged.
pub fn check_join_ops(ops: &JoinOps) -> Result<(), PreconditionError> {
    check_string("group name", Some(&ops.group_name), GROUP_NAME_MAX_SIZE)?;
    check_string("properties", Some(&ops.properties), PROPERTIES_MAX_SIZE)?;
    check_string("parameters", ops.parameters.as_deref(), PARAMS_MAX_SIZE)?;
    check_string("principal", ops.principal.as_deref(), PRINCIPAL_MAX_SIZE)?;
    Ok(())
}

pub fn encode_downcall(encoder: &mut Encoder, member_id: i32, call: &Downcall) {
    encoder.write_int(member_id);
    encoder.write_int(call.dn_type() as i32);
    match call {
        Downcall::Join(ops) => {
            encoder.write_string(Some(&ops.group_name));
            encoder.write_string(Some(&ops.properties));
            encoder.write_string(ops.parameters.as_deref());
            encoder.write_string(ops.principal.as_deref());
            encoder.write_bool(ops.secure);
        }
        Downcall::Send(ranks) | Downcall::Suspect(ranks) => encoder.write_int_array(ranks),
        Downcall::Send1(dest) => encoder.write_int(*dest),
        Downcall::Cast | Downcall::Leave | Downcall::BlockOk => {}
    }
}

pub fn decode_downcall(decoder: &mut Decoder<'_>) -> Result<(i32, Downcall), ProtocolError> {
    let member_id = decoder.read_int()?;
    let tag = decoder.read_int()?;
    let dn_type = DnType::from_i32(tag).ok_or(ProtocolError::UnknownDowncall(tag))?;

    let call = match dn_type {
        DnType::Join => {
            let group_name = decoder.read_string(GROUP_NAME_MAX_SIZE)?;
            let properties = decoder.read_string(PROPERTIES_MAX_SIZE)?;
            let parameters = decoder.read_string(PARAMS_MAX_SIZE)?;
            let principal = decoder.read_string(PRINCIPAL_MAX_SIZE)?;
            let secure = decoder.read_bool()?;
            Downcall::Join(JoinOps {
                group_name,
                properties,
                parameters: Some(parameters).filter(|s| !s.is_empty()),
                principal: Some(principal).filter(|s| !s.is_empty()),
                secure,
            })
        }
        DnType::Cast => Downcall::Cast,
        DnType::Send => Downcall::Send(decoder.read_int_array()?),
        DnType::Send1 => Downcall::Send1(decoder.read_int()?),
        DnType::Suspect => Downcall::Suspect(decoder.read_int_array()?),
        DnType::Leave => Downcall::Leave,
        DnType::BlockOk => Downcall::BlockOk,
    };
    Ok((member_id, call))
}

fn encode_view(encoder: &mut Encoder, view: &View) {
    encoder.write_int(view.nmembers);
    encoder.write_string(Some(&view.version));
    encoder.write_string(Some(&view.group));
    encoder.write_string(Some(&view.proto));
    encoder.write_int(view.ltime);
    encoder.write_bool(view.primary);
    encoder.write_string(Some(&view.parameters));
    encoder.write_string_array(&view.address);
    encoder.write_string_array(&view.view);
    encoder.write_string(Some(&view.endpt));
    encoder.write_string(Some(&view.addr));
    encoder.write_int(view.rank);
    encoder.write_string(Some(&view.name));
    encoder.write_view_id(&view.view_id);
}

fn decode_view(decoder: &mut Decoder<'_>) -> Result<View, ProtocolError> {
    Ok(View {
        nmembers: decoder.read_int()?,
        version: decoder.read_string(VERSION_MAX_SIZE)?,
        group: decoder.read_string(GROUP_NAME_MAX_SIZE)?,
        proto: decoder.read_string(PROTOCOL_MAX_SIZE)?,
        ltime: decoder.read_int()?,
        primary: decoder.read_bool()?,
        parameters: decoder.read_string(PARAMS_MAX_SIZE)?,
        address: decoder.read_string_array(ADDR_MAX_SIZE)?,
        view: decoder.read_string_array(ENDPT_MAX_SIZE)?,
        endpt: decoder.read_string(ENDPT_MAX_SIZE)?,
        addr: decoder.read_string(ADDR_MAX_SIZE)?,
        rank: decoder.read_int()?,
        name: decoder.read_string(NAME_MAX_SIZE)?,
        view_id: decoder.read_view_id()?,
    })
}

pub fn encode_upcall(encoder: &mut Encoder, member_id: i32, call: &Upcall) {
    encoder.write_int(member_id);
    encoder.write_int(call.up_type() as i32);
    match call {
        Upcall::View(view) => encode_view(encoder, view),
        Upcall::Cast { origin } | Upcall::Send { origin } => encoder.write_int(*origin),
        Upcall::Block | Upcall::Exit => {}
    }
}

pub fn decode_upcall(decoder: &mut Decoder<'_>) -> Result<(i32, Upcall), ProtocolError> {
    let member_id = decoder.read_int()?;
    let tag = decoder.read_int()?;
    let up_type = UpType::from_i32(tag).ok_or(ProtocolError::UnknownUpcall(tag))?;

    let call = match up_type {
        UpType::View => Upcall::View(decode_view(decoder)?),
        UpType::Cast => Upcall::Cast {
            origin: decoder.read_int()?,
        },
        UpType::Send => Upcall::Send {
            origin: decoder.read_int()?,
        },
        UpType::Block => Upcall::Block,
        UpType::Exit => Upcall::Exit,
    };
    Ok((member_id, call))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::ViewId;

    fn roundtrip_down(call: Downcall) {
        let mut encoder = Encoder::default();
        encode_downcall(&mut encoder, 9, &call);
        let mut decoder = Decoder::new(encoder.as_bytes());
        let (id, decoded) = decode_downcall(&mut decoder).unwrap();
        decoder.finish().unwrap();
        assert_eq!(id, 9);
        assert_eq!(decoded, call);
    }

    fn sample_view() -> View {
        View {
            nmembers: 2,
            version: "2.01".into(),
            group: "G".into(),
            proto: "Top:Heal:Switch:Leave:Inter:Intra:Elect:Merge:Slander:Sync:Suspect".into(),
            ltime: 4,
            primary: true,
            parameters: "suspect_max_idle=3:int".into(),
            address: vec!["{Deering:UDP:...}".into(), "{Deering:UDP:...}".into()],
            view: vec!["e1".into(), "e2".into()],
            endpt: "e2".into(),
            addr: "{Deering:UDP:...}".into(),
            rank: 1,
            name: "e2:G".into(),
            view_id: ViewId::new(4, "e1"),
        }
    }

    #[test]
    fn test_downcall_roundtrip_every_kind() {
        roundtrip_down(Downcall::Join(
            JoinOps::new("G")
                .with_parameters("suspect_max_idle=3:int")
                .with_principal("alice")
                .secure(true),
        ));
        roundtrip_down(Downcall::Join(JoinOps::new("G")));
        roundtrip_down(Downcall::Cast);
        roundtrip_down(Downcall::Send(vec![0, 2]));
        roundtrip_down(Downcall::Send1(1));
        roundtrip_down(Downcall::Suspect(vec![3]));
        roundtrip_down(Downcall::Leave);
        roundtrip_down(Downcall::BlockOk);
    }

    #[test]
    fn test_cast_header_layout() {
        let mut encoder = Encoder::default();
        encode_downcall(&mut encoder, 1, &Downcall::Cast);
        assert_eq!(encoder.as_bytes(), &[0u8, 0, 0, 1, 0, 0, 0, 2]);
    }

    #[test]
    fn test_upcall_roundtrip() {
        for call in [
            Upcall::View(sample_view()),
            Upcall::Cast { origin: 1 },
            Upcall::Send { origin: 0 },
            Upcall::Block,
            Upcall::Exit,
        ] {
            let mut encoder = Encoder::default();
            encode_upcall(&mut encoder, 3, &call);
            let mut decoder = Decoder::new(encoder.as_bytes());
            assert_eq!(decode_upcall(&mut decoder).unwrap(), (3, call));
            decoder.finish().unwrap();
        }
    }

    #[test]
    fn test_unknown_tags() {
        let mut decoder = Decoder::new(&[0, 0, 0, 1, 0, 0, 0, 9]);
        assert_eq!(
            decode_upcall(&mut decoder),
            Err(ProtocolError::UnknownUpcall(9))
        );

        let mut decoder = Decoder::new(&[0, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(
            decode_downcall(&mut decoder),
            Err(ProtocolError::UnknownDowncall(0))
        );
    }

    #[test]
    fn test_view_with_oversized_version_rejected() {
        let mut view = sample_view();
        view.version = "123456789".into();
        let mut encoder = Encoder::default();
        encode_upcall(&mut encoder, 1, &Upcall::View(view));

        let mut decoder = Decoder::new(encoder.as_bytes());
        assert_eq!(
            decode_upcall(&mut decoder),
            Err(ProtocolError::StringTooLong { len: 9, max: 8 })
        );
    }

    #[test]
    fn test_join_ops_checked() {
        assert!(check_join_ops(&JoinOps::new("G")).is_ok());
        assert_eq!(
            check_join_ops(&JoinOps::new("x".repeat(65))),
            Err(PreconditionError::StringTooLong {
                field: "group name",
                len: 65,
                max: 64
            })
        );
        assert_eq!(
            check_join_ops(&JoinOps::new("G").with_principal("\u{e9}lodie")),
            Err(PreconditionError::NotSingleByte { field: "principal" })
        );
    }
}
