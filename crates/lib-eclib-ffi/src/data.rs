//! Decoding of raw acquisition buffers.
//!
//! `BL_GetData` returns a flat array of `u32` words laid out as
//! `rows × cols`, where the column layout depends on the technique that
//! produced the buffer and, for some techniques, on the instrument
//! series and the process index. When the process index is 0 the first
//! two words of every row are a 64-bit timestamp in time-base ticks;
//! process 1 buffers carry no per-row time.
//!
//! Floats are transported as opaque `u32` bit patterns that only the
//! vendor's `BL_ConvertNumericIntoSingle` may decode, so decoding takes
//! the converter as a closure rather than calling the library directly.
//! Tests substitute a plain bit reinterpretation.

use crate::error::{EclError, EclResult};
use crate::raw::DataInfos;
use lib_types::TechniqueId;

/// How one raw word of a data row decodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Vendor-encoded single, decoded through the converter.
    Single,
    /// Plain signed integer.
    Int,
}

/// One column of a technique's data layout.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn sgl(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Single,
    }
}

const fn int(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Int,
    }
}

const OCV_VMP3: &[FieldSpec] = &[sgl("Ewe"), sgl("Ece")];
const OCV_VMP4: &[FieldSpec] = &[sgl("Ewe")];
const AMPEROMETRY: &[FieldSpec] = &[sgl("Ewe"), sgl("I"), int("cycle")];
const CV: &[FieldSpec] = &[sgl("Ec"), sgl("I"), sgl("Ewe"), int("cycle")];
const PEIS_PROCESS1: &[FieldSpec] = &[
    sgl("freq"),
    sgl("abs_Ewe"),
    sgl("abs_I"),
    sgl("Phase_Zwe"),
    sgl("Ewe"),
    sgl("I"),
    int("blank"),
    sgl("abs_Ece"),
    sgl("abs_Ice"),
    sgl("Phase_Zce"),
    sgl("Ece"),
    int("blank2"),
    int("blank3"),
    sgl("t"),
    int("Irange"),
];

/// Column layout for `technique` as produced by the given process.
///
/// `vmp4` selects the layout variants of the VMP4 instrument series
/// (SP-200/SP-300/VSP-300/VMP-300/SP-240), which drop the counter
/// electrode column from OCV buffers.
pub fn technique_fields(
    technique: TechniqueId,
    vmp4: bool,
    process_index: i32,
) -> Option<&'static [FieldSpec]> {
    match (technique, process_index) {
        (TechniqueId::Ocv, 0) => Some(if vmp4 { OCV_VMP4 } else { OCV_VMP3 }),
        (TechniqueId::Ca | TechniqueId::Cp, 0) => Some(AMPEROMETRY),
        (TechniqueId::CaLimit | TechniqueId::CpLimit, 0) => Some(AMPEROMETRY),
        (TechniqueId::Cv, 0) => Some(CV),
        (TechniqueId::Peis, 0) => Some(AMPEROMETRY),
        (TechniqueId::Peis, 1) => Some(PEIS_PROCESS1),
        _ => None,
    }
}

/// One decoded column value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldValue {
    Single(f32),
    Int(i32),
}

impl FieldValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Single(v) => f64::from(*v),
            Self::Int(v) => f64::from(*v),
        }
    }
}

/// One decoded data row.
#[derive(Clone, Debug, PartialEq)]
pub struct DataPoint {
    /// Absolute time in seconds; absent for process-1 buffers.
    pub time: Option<f64>,
    /// Column values, ordered as in the field layout.
    pub values: Vec<FieldValue>,
}

/// A fully decoded data buffer.
#[derive(Clone, Debug)]
pub struct ChannelData {
    pub technique: TechniqueId,
    pub process_index: i32,
    pub loop_count: i32,
    /// Start time of the buffer in seconds.
    pub start_time: f64,
    /// Names of the decoded columns.
    pub fields: Vec<&'static str>,
    pub points: Vec<DataPoint>,
}

impl ChannelData {
    /// An empty buffer (technique id 0, no data produced yet).
    pub fn empty() -> Self {
        Self {
            technique: TechniqueId::None,
            process_index: 0,
            loop_count: 0,
            start_time: 0.0,
            fields: Vec::new(),
            points: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All decoded values of one named column.
    pub fn column(&self, name: &str) -> Option<Vec<FieldValue>> {
        let idx = self.fields.iter().position(|f| *f == name)?;
        Some(self.points.iter().map(|p| p.values[idx]).collect())
    }
}

/// Decode a raw buffer into typed points.
///
/// `convert` decodes one vendor-encoded word into a float; production
/// callers pass `BL_ConvertNumericIntoSingle` through
/// [`crate::EclLibrary::convert_numeric_into_single`].
pub fn decode_buffer(
    buffer: &[u32],
    infos: &DataInfos,
    time_base: f32,
    vmp4: bool,
    mut convert: impl FnMut(u32) -> EclResult<f32>,
) -> EclResult<ChannelData> {
    let technique = TechniqueId::from_raw(infos.technique_id);
    if technique == TechniqueId::None {
        return Ok(ChannelData::empty());
    }

    let rows = usize::try_from(infos.nb_rows)
        .map_err(|_| EclError::DataLayout(format!("negative row count {}", infos.nb_rows)))?;
    let cols = usize::try_from(infos.nb_cols)
        .map_err(|_| EclError::DataLayout(format!("negative column count {}", infos.nb_cols)))?;
    if rows * cols > buffer.len() {
        return Err(EclError::DataLayout(format!(
            "{rows} rows x {cols} cols exceeds the {} word buffer",
            buffer.len()
        )));
    }

    let fields = technique_fields(technique, vmp4, infos.process_index).ok_or_else(|| {
        EclError::DataLayout(format!(
            "no column layout for {technique} process {}",
            infos.process_index
        ))
    })?;

    // Process 0 rows start with the two timestamp words.
    let time_words = if infos.process_index == 0 { 2 } else { 0 };
    if cols != time_words + fields.len() {
        return Err(EclError::DataLayout(format!(
            "{technique} process {} expects {} columns, buffer has {cols}",
            infos.process_index,
            time_words + fields.len()
        )));
    }

    let mut points = Vec::with_capacity(rows);
    for row in buffer[..rows * cols].chunks_exact(cols) {
        let time = if infos.process_index == 0 {
            let ticks = (u64::from(row[0]) << 32) | u64::from(row[1]);
            Some(infos.start_time + ticks as f64 * f64::from(time_base))
        } else {
            None
        };
        let mut values = Vec::with_capacity(fields.len());
        for (word, field) in row[time_words..].iter().zip(fields) {
            values.push(match field.kind {
                FieldKind::Single => FieldValue::Single(convert(*word)?),
                FieldKind::Int => FieldValue::Int(*word as i32),
            });
        }
        points.push(DataPoint { time, values });
    }

    Ok(ChannelData {
        technique,
        process_index: infos.process_index,
        loop_count: infos.loop_count,
        start_time: infos.start_time,
        fields: fields.iter().map(|f| f.name).collect(),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(v: f32) -> u32 {
        v.to_bits()
    }

    fn reinterpret(word: u32) -> EclResult<f32> {
        Ok(f32::from_bits(word))
    }

    fn infos(technique_id: i32, rows: i32, cols: i32, process: i32) -> DataInfos {
        DataInfos {
            nb_rows: rows,
            nb_cols: cols,
            technique_id,
            process_index: process,
            start_time: 10.0,
            ..DataInfos::default()
        }
    }

    #[test]
    fn empty_technique_decodes_to_nothing() {
        let data = decode_buffer(&[0; 8], &infos(0, 0, 0, 0), 1.0, false, reinterpret).unwrap();
        assert!(data.is_empty());
        assert_eq!(data.technique, TechniqueId::None);
    }

    #[test]
    fn ocv_rows_decode_with_timestamps() {
        // Two OCV rows on a VMP3: t_high, t_low, Ewe, Ece.
        let buffer = [
            0,
            100,
            bits(1.5),
            bits(0.25),
            0,
            200,
            bits(1.6),
            bits(0.26),
        ];
        let data = decode_buffer(
            &buffer,
            &infos(100, 2, 4, 0),
            0.5,
            false,
            reinterpret,
        )
        .unwrap();
        assert_eq!(data.fields, vec!["Ewe", "Ece"]);
        assert_eq!(data.points.len(), 2);
        assert_eq!(data.points[0].time, Some(10.0 + 100.0 * 0.5));
        assert_eq!(data.points[0].values[0], FieldValue::Single(1.5));
        assert_eq!(data.points[1].time, Some(10.0 + 200.0 * 0.5));
        assert_eq!(data.column("Ece").unwrap()[1], FieldValue::Single(0.26));
    }

    #[test]
    fn ocv_timestamp_uses_high_word() {
        let buffer = [1, 0, bits(0.0), bits(0.0)];
        let data = decode_buffer(&buffer, &infos(100, 1, 4, 0), 1.0, false, reinterpret).unwrap();
        assert_eq!(data.points[0].time, Some(10.0 + 4294967296.0));
    }

    #[test]
    fn vmp4_ocv_drops_counter_electrode() {
        let buffer = [0, 1, bits(3.3)];
        let data = decode_buffer(&buffer, &infos(100, 1, 3, 0), 1.0, true, reinterpret).unwrap();
        assert_eq!(data.fields, vec!["Ewe"]);
    }

    #[test]
    fn cp_rows_carry_current_and_cycle() {
        let buffer = [0, 1, bits(0.5), bits(0.001), 3];
        let data = decode_buffer(&buffer, &infos(102, 1, 5, 0), 1.0, false, reinterpret).unwrap();
        assert_eq!(data.fields, vec!["Ewe", "I", "cycle"]);
        assert_eq!(data.points[0].values[2], FieldValue::Int(3));
    }

    #[test]
    fn column_mismatch_is_rejected() {
        let err = decode_buffer(&[0; 8], &infos(100, 1, 8, 0), 1.0, false, reinterpret).unwrap_err();
        assert!(matches!(err, EclError::DataLayout(_)));
    }

    #[test]
    fn oversized_row_count_is_rejected() {
        let err = decode_buffer(&[0; 4], &infos(100, 10, 4, 0), 1.0, false, reinterpret).unwrap_err();
        assert!(matches!(err, EclError::DataLayout(_)));
    }

    #[test]
    fn unknown_layout_is_rejected() {
        // Loop markers produce no decodable rows.
        let err = decode_buffer(&[0; 4], &infos(150, 1, 4, 0), 1.0, false, reinterpret).unwrap_err();
        assert!(matches!(err, EclError::DataLayout(_)));
    }

    #[test]
    fn converter_errors_propagate() {
        let buffer = [0, 1, bits(1.0), bits(1.0)];
        let result = decode_buffer(&buffer, &infos(100, 1, 4, 0), 1.0, false, |_| {
            Err(EclError::DataLayout("bad word".into()))
        });
        assert!(result.is_err());
    }
}
