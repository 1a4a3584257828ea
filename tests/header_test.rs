mod common;

use std::io::Cursor;

use serde_json::{json, Value};

use common::{luks1_image, luks2_image, Luks1Params, Luks2Params, Luks2Slot, SlotKdf, PASSWORD};
use luksde::{
	header::luks2::LuksSegmentSize, ChainingMode, CipherAlgorithm, ErrorKind, Format, Hash,
	Header, IvScheme, LuksError, ParseError, PayloadSize, Priority, SlotState, StreamSource,
};

fn parse(image: Vec<u8>) -> Result<Header, LuksError> {
	Header::read_from(&mut StreamSource::new(Cursor::new(image)))
}

#[test]
fn luks1_header() {
	let fixture = luks1_image(&Luks1Params {
		slots: vec![Some(PASSWORD), None, Some(PASSWORD)],
		..Default::default()
	});
	let header = parse(fixture.image).unwrap();

	assert_eq!(header.version(), 1);
	assert!(matches!(header.format, Format::Luks1));
	assert_eq!(header.cipher.algorithm, CipherAlgorithm::Aes);
	assert_eq!(header.cipher.mode, ChainingMode::Xts);
	assert_eq!(header.cipher.iv, IvScheme::Plain64);
	assert_eq!(header.hash, Hash::Sha256);
	assert_eq!(header.key_size, 64);
	assert_eq!(header.payload_offset, fixture.payload_offset as u64);
	assert_eq!(header.payload_size, PayloadSize::Dynamic);
	assert_eq!(header.sector_size, 512);
	assert_eq!(header.uuid, "0b3f6c1a-2d4e-4f60-8a7b-9c0d1e2f3a4b");
	assert_eq!(header.digest.digest.len(), 20);

	assert_eq!(header.key_slots.len(), 8);
	let states: Vec<SlotState> = header.key_slots.iter().map(|ks| ks.state).collect();
	assert_eq!(states[0], SlotState::Enabled);
	assert_eq!(states[1], SlotState::Disabled);
	assert_eq!(states[2], SlotState::Enabled);
	assert!(states[3..].iter().all(|s| *s == SlotState::Disabled));
	let enabled: Vec<usize> = header.enabled_key_slots().map(|ks| ks.index).collect();
	assert_eq!(enabled, [0, 2]);

	let slot = &header.key_slots[0];
	assert_eq!(slot.key_material_offset, 8 * 512);
	assert_eq!(slot.stripes, 4000);
	assert_eq!(slot.split_key_len(), Some(256_000));
	assert_eq!(slot.priority, Priority::Normal);
}

#[test]
fn luks1_cbc_essiv_header() {
	let fixture = luks1_image(&Luks1Params {
		cipher_mode: "cbc-essiv:sha256",
		key_size: 32,
		..Default::default()
	});
	let header = parse(fixture.image).unwrap();
	assert_eq!(header.cipher.mode, ChainingMode::Cbc);
	assert_eq!(header.cipher.iv, IvScheme::Essiv(Hash::Sha256));
	assert_eq!(header.cipher.to_string(), "aes-cbc-essiv:sha256");
}

#[test]
fn luks2_header() {
	let fixture = luks2_image(&Luks2Params {
		sector_size: 4096,
		iv_tweak: 16,
		fixed_size: true,
		slots: vec![
			Luks2Slot {
				password: PASSWORD,
				kdf: SlotKdf::Argon2id,
				priority: None,
			},
			Luks2Slot {
				password: PASSWORD,
				kdf: SlotKdf::Pbkdf2,
				priority: Some(2),
			},
		],
		..Default::default()
	});
	let header = parse(fixture.image).unwrap();

	assert_eq!(header.version(), 2);
	assert_eq!(header.key_size, 64);
	assert_eq!(header.sector_size, 4096);
	assert_eq!(header.iv_tweak, 16);
	assert_eq!(header.payload_offset, fixture.payload_offset as u64);
	assert_eq!(header.payload_size, PayloadSize::Fixed(64 * 1024));
	assert_eq!(header.uuid, "6e2a1f4c-9b8d-4e3f-a1c2-3d4e5f607182");
	assert_eq!(header.digest.digest.len(), 32);

	let order: Vec<usize> = header.unlock_order().iter().map(|ks| ks.index).collect();
	assert_eq!(order, [1, 0]);

	let Format::Luks2(metadata) = &header.format else {
		panic!("expected LUKS2 metadata");
	};
	assert_eq!(metadata.label.as_deref(), Some("test"));
	assert_eq!(metadata.subsystem, None);
	assert_eq!(metadata.seqid, 7);
	assert_eq!(metadata.hdr_size, 0x4000);
	assert_eq!(metadata.header_offset, 0);
	assert_eq!(metadata.checksum_algorithm, "sha256");
	assert!(matches!(
		metadata.json.segments[&0],
		luksde::header::luks2::LuksSegment::Crypt {
			size: LuksSegmentSize::Fixed(65536),
			..
		}
	));
}

#[test]
fn luks2_falls_back_to_secondary_header() {
	let fixture = luks2_image(&Luks2Params {
		corrupt_primary: true,
		..Default::default()
	});
	let header = parse(fixture.image).unwrap();
	let Format::Luks2(metadata) = &header.format else {
		panic!("expected LUKS2 metadata");
	};
	assert_eq!(metadata.header_offset, 0x4000);
}

#[test]
fn luks2_bad_checksum_without_secondary() {
	let mut image = luks2_image(&Luks2Params {
		corrupt_primary: true,
		..Default::default()
	})
	.image;
	image[0x4000..0x4006].fill(0);
	let err = parse(image).unwrap_err();
	assert!(matches!(
		err,
		LuksError::ParseError(ParseError::InvalidChecksum { .. })
	));
	assert_eq!(err.kind(), ErrorKind::Format);
}

fn argon2id_slot(patch: fn(&mut Value)) -> Vec<u8> {
	luks2_image(&Luks2Params {
		slots: vec![Luks2Slot {
			password: PASSWORD,
			kdf: SlotKdf::Argon2id,
			priority: None,
		}],
		patch_json: Some(patch),
		..Default::default()
	})
	.image
}

#[test]
fn luks2_rejects_oversized_area_key() {
	let image = argon2id_slot(|json| {
		json["keyslots"]["0"]["area"]["key_size"] = json!(1_000_000_000_000_000u64);
	});
	let err = parse(image).unwrap_err();
	assert!(matches!(
		err,
		LuksError::ParseError(ParseError::InvalidKeySize(1_000_000_000_000_000))
	));
	assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn luks2_rejects_excessive_argon2_memory() {
	let image = argon2id_slot(|json| {
		json["keyslots"]["0"]["kdf"]["memory"] = json!(u32::MAX);
	});
	let err = parse(image).unwrap_err();
	assert!(matches!(
		err,
		LuksError::ParseError(ParseError::KdfCostTooHigh {
			index: 0,
			value: u32::MAX,
			max: 4194304,
			..
		})
	));
	assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn luks2_rejects_excessive_argon2_lanes() {
	let image = argon2id_slot(|json| {
		json["keyslots"]["0"]["kdf"]["cpus"] = json!(64);
	});
	let err = parse(image).unwrap_err();
	assert!(matches!(
		err,
		LuksError::ParseError(ParseError::KdfCostTooHigh { what: "argon2 cpus", value: 64, .. })
	));
}

#[test]
fn luks2_accepts_argon2_cost_at_the_limits() {
	let image = argon2id_slot(|json| {
		json["keyslots"]["0"]["kdf"]["memory"] = json!(4194304);
		json["keyslots"]["0"]["kdf"]["cpus"] = json!(4);
	});
	let header = parse(image).unwrap();
	assert!(matches!(
		header.key_slots[0].kdf,
		luksde::kdf::Kdf::Argon2 { memory: 4194304, cpus: 4, .. }
	));
}

#[test]
fn bad_magic() {
	let mut image = luks1_image(&Luks1Params::default()).image;
	image[0] = b'X';
	let err = parse(image).unwrap_err();
	assert!(matches!(err, LuksError::ParseError(ParseError::InvalidHeaderMagic)));
}

#[test]
fn unknown_version() {
	let mut image = luks1_image(&Luks1Params::default()).image;
	image[7] = 3;
	let err = parse(image).unwrap_err();
	assert!(matches!(
		err,
		LuksError::ParseError(ParseError::InvalidHeaderVersion(3))
	));
}

#[test]
fn truncated_header() {
	let image = luks1_image(&Luks1Params::default()).image;
	let err = parse(image[..300].to_vec()).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Format);

	let err = parse(image[..4].to_vec()).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn empty_source() {
	let err = parse(Vec::new()).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn luks1_payload_past_device_end() {
	let fixture = luks1_image(&Luks1Params::default());
	let err = parse(fixture.image[..fixture.payload_offset - 512].to_vec()).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn header_display() {
	let header = parse(luks1_image(&Luks1Params::default()).image).unwrap();
	let text = header.to_string();
	assert!(text.starts_with("LUKS header {"));
	assert!(text.contains("\tversion: 1"));
	assert!(text.contains("\tcipher: aes"));
	assert!(text.contains("\tcipher mode: xts-plain64"));
	assert!(text.contains("0b3f6c1a-2d4e-4f60-8a7b-9c0d1e2f3a4b"));
}
