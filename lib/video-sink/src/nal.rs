//! Turns the encoder's Annex B output into the length-prefixed (AVCC) samples MP4 stores.

use h264_reader::{
    annexb::AnnexBReader,
    nal::{Nal, RefNal, UnitType},
    push::NalInterest,
};
use std::io::Read;

/// A complete NAL unit in NAL form, header byte included.
#[derive(Debug, Clone)]
pub struct NalUnit {
    pub unit_type: UnitType,
    pub data: Vec<u8>,
}

impl NalUnit {
    pub fn is_parameter_set(&self) -> bool {
        matches!(
            self.unit_type,
            UnitType::SeqParameterSet | UnitType::PicParameterSet
        )
    }
}

pub fn parse_annexb(stream: &[u8]) -> Vec<NalUnit> {
    let mut units = vec![];

    {
        let mut reader = AnnexBReader::accumulate(|nal: RefNal<'_>| {
            if !nal.is_complete() {
                return NalInterest::Buffer;
            }

            let header = match nal.header() {
                Ok(header) => header,
                Err(e) => {
                    log::warn!("skip NAL unit with a bad header: {e:?}");
                    return NalInterest::Ignore;
                }
            };

            let mut data = Vec::new();
            match nal.reader().read_to_end(&mut data) {
                Ok(_) => units.push(NalUnit {
                    unit_type: header.nal_unit_type(),
                    data,
                }),
                Err(e) => log::warn!("read NAL unit failed: {e}"),
            }

            NalInterest::Buffer
        });

        reader.push(stream);
        reader.reset();
    }

    units
}

pub fn find_unit(units: &[NalUnit], unit_type: UnitType) -> Option<&NalUnit> {
    units.iter().find(|unit| unit.unit_type == unit_type)
}

pub fn is_keyframe(units: &[NalUnit]) -> bool {
    find_unit(units, UnitType::SliceLayerWithoutPartitioningIdr).is_some()
}

/// Join NAL units with 4 byte big-endian length prefixes.
pub fn length_prefixed<'a>(units: impl IntoIterator<Item = &'a NalUnit>) -> Vec<u8> {
    let mut out = vec![];
    for unit in units {
        out.extend_from_slice(&(unit.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&unit.data);
    }
    out
}
