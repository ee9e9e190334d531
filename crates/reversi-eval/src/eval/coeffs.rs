//! Coefficient files: layout, loading, and legacy migration.
//!
//! A coefficient set is one contiguous array of `i32` words covering every
//! feature map. Pattern-map words are packed: the clamped centi-disc
//! coefficient sits in the high 16 bits, and for straight lines and the
//! corner triangle the two potential-mobility counts of the configuration
//! occupy bytes 1 (opponent) and 0 (mover). Scalar maps (mobility,
//! potential mobility, parity) store plain values.
//!
//! On disk a file holds a small header and two consecutive per-map blocks,
//! one for each parity subset of its empty-count bucket. Files written by
//! old trainers store 32-bit floats in disc units; those are converted to
//! the packed 16-bit form in place on first load.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use aligned_vec::{AVec, ConstAlign, avec};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::constants::{CACHE_LINE_SIZE, COEFF_CLAMP, STONE_VALUE};
use crate::eval::tables::{self, PM_MOVER, PM_OPPONENT, Tables};

/// File format version.
const COEFF_VERSION: i32 = 1;

/// `params` value of the packed 16-bit centi-disc body.
const PARAMS_PACKED: u32 = 100;

/// `params` value of the legacy 32-bit float body.
const PARAMS_FLOAT: u32 = 14;

// Per-map word offsets, in file and memory order.
pub const OFS_R1: usize = 0;
pub const OFS_R2: usize = OFS_R1 + 6561;
pub const OFS_R3: usize = OFS_R2 + 6561;
pub const OFS_R4: usize = OFS_R3 + 6561;
pub const OFS_D8: usize = OFS_R4 + 6561;
pub const OFS_D7: usize = OFS_D8 + 6561;
pub const OFS_D6: usize = OFS_D7 + 2187;
pub const OFS_D5: usize = OFS_D6 + 729;
pub const OFS_TRIANGLE: usize = OFS_D5 + 243;
pub const OFS_C2X4: usize = OFS_TRIANGLE + 9 * 6561;
pub const OFS_C2X5: usize = OFS_C2X4 + 6561;
pub const OFS_EDGE_XX: usize = OFS_C2X5 + 9 * 6561;
pub const OFS_M1: usize = OFS_EDGE_XX + 9 * 6561;
pub const OFS_M2: usize = OFS_M1 + 64;
pub const OFS_PM1: usize = OFS_M2 + 64;
pub const OFS_PM2: usize = OFS_PM1 + 64;
pub const OFS_PARITY: usize = OFS_PM2 + 64;

/// Total words in one coefficient set.
pub const COEFF_WORDS: usize = OFS_PARITY + 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MapKind {
    /// Straight line of the given length; carries per-length PM counts.
    Line(usize),
    /// Corner triangle; carries its own PM counts and mirror IDs.
    Triangle,
    /// 2x4 corner block; folded into the 2x5 block after loading.
    Corner2x4,
    /// 2x5 corner block.
    Corner2x5,
    /// Edge plus two X-squares; mirror IDs.
    EdgeXx,
    /// Plain scalar table (mobility, potential mobility).
    Scalar,
    /// Parity table; receives the late-bucket nudge.
    Parity,
}

struct MapSpec {
    kind: MapKind,
    offset: usize,
    n_configs: usize,
}

const MAPS: [MapSpec; 17] = [
    MapSpec { kind: MapKind::Line(8), offset: OFS_R1, n_configs: 6561 },
    MapSpec { kind: MapKind::Line(8), offset: OFS_R2, n_configs: 6561 },
    MapSpec { kind: MapKind::Line(8), offset: OFS_R3, n_configs: 6561 },
    MapSpec { kind: MapKind::Line(8), offset: OFS_R4, n_configs: 6561 },
    MapSpec { kind: MapKind::Line(8), offset: OFS_D8, n_configs: 6561 },
    MapSpec { kind: MapKind::Line(7), offset: OFS_D7, n_configs: 2187 },
    MapSpec { kind: MapKind::Line(6), offset: OFS_D6, n_configs: 729 },
    MapSpec { kind: MapKind::Line(5), offset: OFS_D5, n_configs: 243 },
    MapSpec { kind: MapKind::Triangle, offset: OFS_TRIANGLE, n_configs: 9 * 6561 },
    MapSpec { kind: MapKind::Corner2x4, offset: OFS_C2X4, n_configs: 6561 },
    MapSpec { kind: MapKind::Corner2x5, offset: OFS_C2X5, n_configs: 9 * 6561 },
    MapSpec { kind: MapKind::EdgeXx, offset: OFS_EDGE_XX, n_configs: 9 * 6561 },
    MapSpec { kind: MapKind::Scalar, offset: OFS_M1, n_configs: 64 },
    MapSpec { kind: MapKind::Scalar, offset: OFS_M2, n_configs: 64 },
    MapSpec { kind: MapKind::Scalar, offset: OFS_PM1, n_configs: 64 },
    MapSpec { kind: MapKind::Scalar, offset: OFS_PM2, n_configs: 64 },
    MapSpec { kind: MapKind::Parity, offset: OFS_PARITY, n_configs: 2 },
];

impl MapSpec {
    /// Number of stored coefficients: one per mirror orbit for the
    /// self-symmetric corner maps, one per configuration otherwise.
    fn n_ids(&self, t: &Tables) -> usize {
        match self.kind {
            MapKind::Triangle => t.triangle_ids.n_ids,
            MapKind::EdgeXx => t.edge_xx_ids.n_ids,
            _ => self.n_configs,
        }
    }

    fn config_to_id(&self, config: usize, t: &Tables) -> usize {
        match self.kind {
            MapKind::Triangle => t.triangle_ids.config_to_id[config] as usize,
            MapKind::EdgeXx => t.edge_xx_ids.config_to_id[config] as usize,
            _ => config,
        }
    }
}

/// One immutable, fully expanded coefficient array.
pub struct CoeffSet {
    coeffs: AVec<i32, ConstAlign<CACHE_LINE_SIZE>>,
}

impl CoeffSet {
    fn zeroed() -> Self {
        CoeffSet {
            coeffs: avec![[CACHE_LINE_SIZE] | 0i32; COEFF_WORDS],
        }
    }

    /// The full coefficient array.
    #[inline(always)]
    pub fn as_slice(&self) -> &[i32] {
        &self.coeffs
    }
}

/// Errors from loading a coefficient store.
#[derive(Debug)]
pub enum CoeffError {
    /// A required file cannot be opened or read.
    File {
        /// The file involved.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// The header is neither the packed nor the legacy float format.
    Format {
        /// The file involved.
        path: PathBuf,
        /// Version word read from the header.
        version: i32,
        /// Params word read from the header.
        params: u32,
    },
    /// The file ends before the expected payload.
    Truncated {
        /// The file involved.
        path: PathBuf,
    },
    /// The legacy-to-packed rewrite could not be completed.
    Rewrite {
        /// The file involved.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// The evaluator family character is not recognized.
    UnsupportedFamily {
        /// The rejected family character.
        family: char,
    },
}

impl std::fmt::Display for CoeffError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoeffError::File { path, source } => {
                write!(f, "Can't read coefficient file {}: {source}", path.display())
            }
            CoeffError::Format { path, version, params } => write!(
                f,
                "Bad coefficient file header in {} (version {version}, params {params})",
                path.display()
            ),
            CoeffError::Truncated { path } => {
                write!(f, "Coefficient file {} is truncated", path.display())
            }
            CoeffError::Rewrite { path, source } => write!(
                f,
                "Can't rewrite legacy coefficient file {}: {source}",
                path.display()
            ),
            CoeffError::UnsupportedFamily { family } => {
                write!(f, "Unsupported evaluator family '{family}'")
            }
        }
    }
}

impl std::error::Error for CoeffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoeffError::File { source, .. } | CoeffError::Rewrite { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Number of coefficient files for a set identifier: late set identifiers
/// use ten narrow buckets, early ones six wide ones.
pub(crate) fn file_count(set: char) -> usize {
    if set >= '9' { 10 } else { 6 }
}

/// `<base_dir>/coefficients/<family><set><letter>.cof`.
pub(crate) fn coefficient_path(
    base_dir: &Path,
    family: char,
    set: char,
    file_index: usize,
) -> PathBuf {
    let letter = (b'a' + file_index as u8) as char;
    base_dir
        .join("coefficients")
        .join(format!("{family}{set}{letter}.cof"))
}

fn read_error(path: &Path, source: io::Error) -> CoeffError {
    if source.kind() == io::ErrorKind::UnexpectedEof {
        CoeffError::Truncated { path: path.to_path_buf() }
    } else {
        CoeffError::File { path: path.to_path_buf(), source }
    }
}

fn open_header(path: &Path) -> Result<(BufReader<File>, i32, u32), CoeffError> {
    let file = File::open(path).map_err(|source| CoeffError::File {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let version = reader
        .read_i32::<LittleEndian>()
        .map_err(|e| read_error(path, e))?;
    let params = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| read_error(path, e))?;
    Ok((reader, version, params))
}

/// Converts one disc-unit float to a packed centi-disc coefficient.
fn pack_stone_value(raw: f32) -> i16 {
    let centi = (raw * STONE_VALUE as f32).round() as i32;
    centi.clamp(-COEFF_CLAMP, COEFF_CLAMP) as i16
}

/// Rewrites a legacy float file as a packed v100 file, atomically: the
/// replacement is staged next to the original and renamed over it.
fn migrate_float_file(mut reader: BufReader<File>, path: &Path) -> Result<(), CoeffError> {
    let mut packed = Vec::new();
    loop {
        match reader.read_f32::<LittleEndian>() {
            Ok(raw) => packed.push(pack_stone_value(raw)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(read_error(path, e)),
        }
    }
    drop(reader);

    let rewrite_error = |source: io::Error| CoeffError::Rewrite {
        path: path.to_path_buf(),
        source,
    };
    let staging = path.with_extension("cof.new");
    let mut writer = BufWriter::new(File::create(&staging).map_err(rewrite_error)?);
    writer.write_i32::<LittleEndian>(COEFF_VERSION).map_err(rewrite_error)?;
    writer.write_u32::<LittleEndian>(PARAMS_PACKED).map_err(rewrite_error)?;
    for &coeff in &packed {
        writer.write_i16::<LittleEndian>(coeff).map_err(rewrite_error)?;
    }
    writer
        .into_inner()
        .map_err(|e| rewrite_error(e.into_error()))?
        .sync_all()
        .map_err(rewrite_error)?;
    std::fs::rename(&staging, path).map_err(rewrite_error)
}

/// Loads one coefficient file into its two parity subsets, migrating a
/// legacy float body first if necessary.
pub(crate) fn load_file(
    path: &Path,
    set: char,
    file_index: usize,
) -> Result<[CoeffSet; 2], CoeffError> {
    let (mut reader, mut version, mut params) = open_header(path)?;
    if version == COEFF_VERSION && params == PARAMS_FLOAT {
        migrate_float_file(reader, path)?;
        (reader, version, params) = open_header(path)?;
    }
    if version != COEFF_VERSION || params != PARAMS_PACKED {
        return Err(CoeffError::Format {
            path: path.to_path_buf(),
            version,
            params,
        });
    }

    let t = tables::tables();
    let first = load_subset(&mut reader, path, set, file_index, t)?;
    let second = load_subset(&mut reader, path, set, file_index, t)?;
    Ok([first, second])
}

fn load_subset(
    reader: &mut BufReader<File>,
    path: &Path,
    set: char,
    file_index: usize,
    t: &Tables,
) -> Result<CoeffSet, CoeffError> {
    let mut out = CoeffSet::zeroed();
    let coeffs = &mut out.coeffs;

    let mut raw = Vec::new();
    for map in &MAPS {
        let n_ids = map.n_ids(t);
        raw.clear();
        raw.resize(n_ids, 0i16);
        reader
            .read_i16_into::<LittleEndian>(&mut raw)
            .map_err(|e| read_error(path, e))?;

        for config in 0..map.n_configs {
            let mut coeff = i32::from(raw[map.config_to_id(config, t)]);
            let word = match map.kind {
                MapKind::Parity => {
                    // Odd-even endgame nudge, late buckets of trained sets only.
                    if set >= 'A' {
                        if file_index >= 7 {
                            coeff += (0.65 * STONE_VALUE as f64) as i32;
                        } else if file_index == 6 {
                            coeff += (0.33 * STONE_VALUE as f64) as i32;
                        }
                    }
                    coeff
                }
                MapKind::Scalar => coeff,
                MapKind::Line(length) => {
                    let pm_opp = i32::from(t.line_pot_mob[PM_OPPONENT][length - 5][config]);
                    let pm_mover = i32::from(t.line_pot_mob[PM_MOVER][length - 5][config]);
                    (coeff.clamp(-COEFF_CLAMP, COEFF_CLAMP) << 16) | (pm_opp << 8) | pm_mover
                }
                MapKind::Triangle => {
                    let pm_opp = i32::from(t.triangle_pot_mob[PM_OPPONENT][config]);
                    let pm_mover = i32::from(t.triangle_pot_mob[PM_MOVER][config]);
                    (coeff.clamp(-COEFF_CLAMP, COEFF_CLAMP) << 16) | (pm_opp << 8) | pm_mover
                }
                MapKind::Corner2x4 | MapKind::Corner2x5 | MapKind::EdgeXx => {
                    coeff.clamp(-COEFF_CLAMP, COEFF_CLAMP) << 16
                }
            };
            coeffs[map.offset + config] = word;
        }
    }

    // The 2x4 block is a sub-pattern of the 2x5 block: fold it in, then
    // retire its slot.
    for config in 0..9 * 6561 {
        let folded = coeffs[OFS_C2X4 + t.fold_2x5_to_2x4[config] as usize];
        coeffs[OFS_C2X5 + config] = coeffs[OFS_C2X5 + config].wrapping_add(folded);
    }
    for word in &mut coeffs[OFS_C2X4..OFS_C2X4 + 6561] {
        *word = 0;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_totals() {
        assert_eq!(OFS_TRIANGLE, 35964);
        assert_eq!(OFS_C2X4, 95013);
        assert_eq!(OFS_M1, 219672);
        assert_eq!(COEFF_WORDS, 219930);
        let sum: usize = MAPS.iter().map(|m| m.n_configs).sum();
        assert_eq!(sum, COEFF_WORDS);
    }

    #[test]
    fn test_maps_are_contiguous() {
        let mut expected = 0;
        for map in &MAPS {
            assert_eq!(map.offset, expected);
            expected += map.n_configs;
        }
    }

    #[test]
    fn test_file_count_selection() {
        // Digits below '9' select six wide buckets; '9' and everything
        // above it in ASCII (all letters included) select ten narrow ones.
        assert_eq!(file_count('2'), 6);
        assert_eq!(file_count('8'), 6);
        assert_eq!(file_count('9'), 10);
        assert_eq!(file_count('A'), 10);
        assert_eq!(file_count('Z'), 10);
        assert_eq!(file_count('z'), 10);
    }

    #[test]
    fn test_coefficient_path_shape() {
        let path = coefficient_path(Path::new("/data"), 'J', 'A', 2);
        assert_eq!(path, Path::new("/data/coefficients/JAc.cof"));
    }

    #[test]
    fn test_clamp_saturates_both_ends() {
        // The packed coefficient is a symmetric clamp: in-range values pass
        // through untouched, out-of-range values saturate.
        assert_eq!(pack_stone_value(1.27), 127);
        assert_eq!(pack_stone_value(-1.27), -127);
        assert_eq!(pack_stone_value(1000.0), COEFF_CLAMP as i16);
        assert_eq!(pack_stone_value(-1000.0), -(COEFF_CLAMP as i16));
        assert_eq!(pack_stone_value(0.0), 0);
    }

    #[test]
    fn test_parity_nudge_constants() {
        assert_eq!((0.65 * STONE_VALUE as f64) as i32, 65);
        assert_eq!((0.33 * STONE_VALUE as f64) as i32, 33);
    }

    #[test]
    fn test_id_counts_match_tables() {
        let t = tables::tables();
        let triangle = MAPS.iter().find(|m| m.kind == MapKind::Triangle).unwrap();
        assert_eq!(triangle.n_ids(t), 29889);
        let edge = MAPS.iter().find(|m| m.kind == MapKind::EdgeXx).unwrap();
        assert_eq!(edge.n_ids(t), 29646);
        let r1 = &MAPS[0];
        assert_eq!(r1.n_ids(t), 6561);
    }
}
