//! Microstructure image codec.
//!
//! ```text
//! Version: 3.0
//! X_Size: 100
//! Y_Size: 100
//! Z_Size: 100
//! Image_Resolution: 1.00
//! 0
//! 1
//! ...
//! ```
//!
//! One integer per voxel follows the header. The version tag picks a decoder
//! from [`FORMATS`]: which phase-id numbering the file uses and whether x or z
//! varies fastest. Files without a header are legacy 100³ images at 1 µm.

use std::io::{BufRead, Read, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{HydrationError, Result};
use crate::lattice::Lattice;
use crate::phase::Phase;

/// Voxel order in the file body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    XFastest,
    ZFastest,
}

/// Phase-id numbering used by a file version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdTable {
    /// Ids written before alkali sulfates were tracked.
    Legacy,
    Current,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFormat {
    pub version: &'static str,
    pub ids: IdTable,
    pub traversal: Traversal,
}

/// Versioned decoder table.
pub const FORMATS: &[ImageFormat] = &[
    ImageFormat {
        version: "2.0",
        ids: IdTable::Legacy,
        traversal: Traversal::XFastest,
    },
    ImageFormat {
        version: "3.0",
        ids: IdTable::Current,
        traversal: Traversal::XFastest,
    },
    ImageFormat {
        version: "3.1",
        ids: IdTable::Current,
        traversal: Traversal::ZFastest,
    },
];

/// Version written by [`write_image`].
pub const WRITE_VERSION: &str = "3.0";

const LEGACY_SIZE: usize = 100;
const LEGACY_RESOLUTION: f64 = 1.0;

/// Legacy id → phase. No alkali sulfates and no diffusing sulfate.
const LEGACY_IDS: [Phase; 45] = [
    Phase::Porosity,
    Phase::C3S,
    Phase::C2S,
    Phase::C3A,
    Phase::C4AF,
    Phase::Gypsum,
    Phase::Hemihydrate,
    Phase::Anhydrite,
    Phase::SilicaFume,
    Phase::Inert,
    Phase::Slag,
    Phase::Asg,
    Phase::Cas2,
    Phase::Ch,
    Phase::Csh,
    Phase::C3AH6,
    Phase::Ettringite,
    Phase::EttringiteC4AF,
    Phase::Afm,
    Phase::Fh3,
    Phase::PozzCsh,
    Phase::SlagCsh,
    Phase::CaCl2,
    Phase::Friedel,
    Phase::Stratlingite,
    Phase::GypsumS,
    Phase::CaCO3,
    Phase::Afmc,
    Phase::InertAgg,
    Phase::AbsGypsum,
    Phase::DiffCsh,
    Phase::DiffCh,
    Phase::DiffGypsum,
    Phase::DiffC3A,
    Phase::DiffC4A,
    Phase::DiffFh3,
    Phase::DiffEttringite,
    Phase::DiffCaCO3,
    Phase::DiffAs,
    Phase::DiffAnhydrite,
    Phase::DiffHemihydrate,
    Phase::DiffCas2,
    Phase::DiffCaCl2,
    Phase::EmptyPore,
    Phase::Crack,
];

impl ImageFormat {
    pub fn for_version(tag: &str) -> Result<&'static ImageFormat> {
        FORMATS
            .iter()
            .find(|f| f.version == tag)
            .ok_or_else(|| HydrationError::UnsupportedVersion(tag.to_string()))
    }

    /// Phase for a raw id under this format.
    pub fn decode(&self, id: u32) -> Result<Phase> {
        let phase = match self.ids {
            IdTable::Legacy => LEGACY_IDS.get(id as usize).copied(),
            IdTable::Current => u8::try_from(id).ok().and_then(Phase::from_id),
        };
        phase.ok_or_else(|| HydrationError::UnknownPhase {
            id,
            version: self.version.to_string(),
        })
    }

    /// Position in x-fastest order of the `k`-th value in file order.
    #[inline]
    fn lattice_index(&self, k: usize, [nx, ny, nz]: [usize; 3]) -> usize {
        match self.traversal {
            Traversal::XFastest => k,
            Traversal::ZFastest => {
                let z = k % nz;
                let y = (k / nz) % ny;
                let x = k / (nz * ny);
                x + nx * (y + ny * z)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageHeader {
    pub format: &'static ImageFormat,
    pub dims: [usize; 3],
    /// Voxel edge [µm].
    pub resolution: f64,
}

impl ImageHeader {
    pub fn voxels(&self) -> usize {
        self.dims.iter().product()
    }
}

fn header_value<'a, I>(tokens: &mut I, key: &str) -> Result<&'a str>
where
    I: Iterator<Item = &'a str>,
{
    let found = tokens
        .next()
        .ok_or_else(|| HydrationError::BadHeader(format!("missing {key}")))?;
    if !found.trim_end_matches(':').eq_ignore_ascii_case(key) {
        return Err(HydrationError::BadHeader(format!(
            "expected {key}, found '{found}'"
        )));
    }
    tokens
        .next()
        .ok_or_else(|| HydrationError::BadHeader(format!("no value for {key}")))
}

fn parse<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| HydrationError::BadValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Read header and raw values, reordered to x-fastest.
pub fn read_raw<R: BufRead>(mut reader: R) -> Result<(ImageHeader, Vec<u32>)> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let mut tokens = text.split_whitespace().peekable();

    let has_header = tokens
        .peek()
        .map_or(false, |t| t.trim_end_matches(':').eq_ignore_ascii_case("version"));
    let header = if has_header {
        let version = header_value(&mut tokens, "Version")?;
        let format = ImageFormat::for_version(version)?;
        let nx = parse("X_Size", header_value(&mut tokens, "X_Size")?)?;
        let ny = parse("Y_Size", header_value(&mut tokens, "Y_Size")?)?;
        let nz = parse("Z_Size", header_value(&mut tokens, "Z_Size")?)?;
        let resolution = parse(
            "Image_Resolution",
            header_value(&mut tokens, "Image_Resolution")?,
        )?;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(HydrationError::BadHeader("zero extent".into()));
        }
        ImageHeader {
            format,
            dims: [nx, ny, nz],
            resolution,
        }
    } else {
        ImageHeader {
            format: &FORMATS[0],
            dims: [LEGACY_SIZE; 3],
            resolution: LEGACY_RESOLUTION,
        }
    };

    let n = header.voxels();
    let mut values = vec![0u32; n];
    for k in 0..n {
        let token = tokens.next().ok_or(HydrationError::PrematureEof {
            context: "image body",
            expected: n,
            read: k,
        })?;
        values[header.format.lattice_index(k, header.dims)] = parse("voxel", token)?;
    }
    debug!(
        version = header.format.version,
        dims = ?header.dims,
        resolution = header.resolution,
        "image read"
    );
    Ok((header, values))
}

/// Decode a phase image into a lattice.
pub fn read_image<R: BufRead>(reader: R) -> Result<Lattice> {
    let (header, raw) = read_raw(reader)?;
    let phases = raw
        .into_iter()
        .map(|id| header.format.decode(id))
        .collect::<Result<Vec<Phase>>>()?;
    let [nx, ny, nz] = header.dims;
    Lattice::from_phases(nx, ny, nz, header.resolution, phases)
}

/// Read a particle-id image that must match `lattice` voxel for voxel.
pub fn read_particles<R: BufRead>(reader: R, lattice: &Lattice) -> Result<Vec<u32>> {
    let (header, raw) = read_raw(reader)?;
    if header.dims != lattice.dims() {
        return Err(HydrationError::SizeMismatch {
            expected: lattice.len(),
            found: header.voxels(),
        });
    }
    Ok(raw)
}

pub fn load_image(path: &Path) -> Result<Lattice> {
    let file = std::fs::File::open(path).map_err(|e| HydrationError::io(path, e))?;
    let lattice = read_image(std::io::BufReader::new(file))?;
    info!(path = %path.display(), dims = ?lattice.dims(), "microstructure loaded");
    Ok(lattice)
}

pub fn load_particles(path: &Path, lattice: &mut Lattice) -> Result<()> {
    let file = std::fs::File::open(path).map_err(|e| HydrationError::io(path, e))?;
    let ids = read_particles(std::io::BufReader::new(file), lattice)?;
    lattice.set_particles(ids)
}

fn write_header<W: Write>(writer: &mut W, lattice: &Lattice) -> Result<()> {
    let [nx, ny, nz] = lattice.dims();
    writeln!(writer, "Version: {WRITE_VERSION}")?;
    writeln!(writer, "X_Size: {nx}")?;
    writeln!(writer, "Y_Size: {ny}")?;
    writeln!(writer, "Z_Size: {nz}")?;
    writeln!(writer, "Image_Resolution: {:.2}", lattice.resolution)?;
    Ok(())
}

/// Write the phase image in the current format, x fastest.
pub fn write_image<W: Write>(lattice: &Lattice, mut writer: W) -> Result<()> {
    write_header(&mut writer, lattice)?;
    for p in &lattice.phase {
        writeln!(writer, "{}", p.id())?;
    }
    Ok(())
}

/// Write the particle-id image in the current format.
pub fn write_particles<W: Write>(lattice: &Lattice, mut writer: W) -> Result<()> {
    write_header(&mut writer, lattice)?;
    for id in &lattice.particle {
        writeln!(writer, "{id}")?;
    }
    Ok(())
}
