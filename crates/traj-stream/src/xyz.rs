//! Multi-frame extended XYZ.
//!
//! Each frame is an atom count line, a `key=value` comment line carrying the
//! cell (`Lattice`, rows of rprimd), the optional scale factors `Acell`,
//! `Time`, `Energy`, `Stress` and `pbc`, then one `Symbol x y z [fx fy fz]` line per atom. Lengths are in Bohr.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use traj_store::elements::{symbol, znucl_from_symbol};
use traj_store::{Snapshot, Species, TrajError, TrajResult, Trajectory};

use crate::source::{SourceHeader, SourceReader};

struct RawFrame {
    symbols: Vec<String>,
    snapshot: Snapshot,
    periodic: bool,
}

pub struct XyzSource {
    header: SourceHeader,
    label: String,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    frame: usize,
    symbols: Vec<String>,
    first: Option<Snapshot>,
}

impl XyzSource {
    /// Open `path` and read the first frame, which fixes the species.
    pub fn open(path: impl AsRef<Path>) -> TrajResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0;
        let first = read_frame(&mut lines, &mut line_no, 0)?
            .ok_or_else(|| TrajError::ParseFailure(format!("{}: no frames", path.display())))?;
        let mut per_atom = Vec::with_capacity(first.symbols.len());
        for sym in &first.symbols {
            let z = znucl_from_symbol(sym).ok_or_else(|| {
                TrajError::ParseFailure(format!("{}: unknown element {sym:?}", path.display()))
            })?;
            per_atom.push(z);
        }
        Ok(Self {
            header: SourceHeader {
                species: Species::from_znucl_per_atom(&per_atom),
                periodic: first.periodic,
                ntime_hint: None,
            },
            label: path.display().to_string(),
            lines,
            line_no,
            frame: 1,
            symbols: first.symbols,
            first: Some(first.snapshot),
        })
    }
}

impl SourceReader for XyzSource {
    fn header(&self) -> &SourceHeader {
        &self.header
    }

    fn next_snapshot(&mut self) -> TrajResult<Option<Snapshot>> {
        if let Some(first) = self.first.take() {
            return Ok(Some(first));
        }
        let Some(raw) = read_frame(&mut self.lines, &mut self.line_no, self.frame)? else {
            return Ok(None);
        };
        if raw.symbols != self.symbols {
            return Err(TrajError::ParseFailure(format!(
                "{}: frame {} changes the atom list",
                self.label, self.frame
            )));
        }
        self.frame += 1;
        Ok(Some(raw.snapshot))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

fn bad(line_no: usize, what: impl std::fmt::Display) -> TrajError {
    TrajError::ParseFailure(format!("line {line_no}: {what}"))
}

fn next_line(
    lines: &mut Lines<BufReader<File>>,
    line_no: &mut usize,
) -> TrajResult<Option<String>> {
    match lines.next() {
        Some(line) => {
            *line_no += 1;
            Ok(Some(line?))
        }
        None => Ok(None),
    }
}

fn read_frame(
    lines: &mut Lines<BufReader<File>>,
    line_no: &mut usize,
    frame: usize,
) -> TrajResult<Option<RawFrame>> {
    let count_line = loop {
        match next_line(lines, line_no)? {
            None => return Ok(None),
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => break line,
        }
    };
    let natom: usize = count_line
        .trim()
        .parse()
        .map_err(|_| bad(*line_no, format!("invalid atom count {:?}", count_line.trim())))?;
    if natom == 0 {
        return Err(bad(*line_no, "frame has no atoms"));
    }
    let comment = next_line(lines, line_no)?.ok_or_else(|| bad(*line_no, "missing comment line"))?;
    let keys = parse_comment(&comment);

    let lattice = keys
        .get("lattice")
        .ok_or_else(|| bad(*line_no, "missing Lattice"))?;
    let lattice = parse_floats::<9>(lattice).ok_or_else(|| bad(*line_no, "Lattice needs 9 numbers"))?;
    let rprimd = [
        [lattice[0], lattice[1], lattice[2]],
        [lattice[3], lattice[4], lattice[5]],
        [lattice[6], lattice[7], lattice[8]],
    ];
    let acell = match keys.get("acell") {
        Some(v) => parse_floats::<3>(v).ok_or_else(|| bad(*line_no, "Acell needs 3 numbers"))?,
        None => [1.0; 3],
    };
    let time = match keys.get("time") {
        Some(v) => v.parse().map_err(|_| bad(*line_no, "bad Time"))?,
        None => frame as f64,
    };
    let energy = match keys.get("energy") {
        Some(v) => Some(v.parse::<f64>().map_err(|_| bad(*line_no, "bad Energy"))?),
        None => None,
    };
    let stress = match keys.get("stress") {
        Some(v) => Some(parse_floats::<6>(v).ok_or_else(|| bad(*line_no, "Stress needs 6 numbers"))?),
        None => None,
    };
    let periodic = match keys.get("pbc") {
        Some(v) => v.split_whitespace().all(|f| matches!(f, "T" | "t" | "True" | "true" | "1")),
        None => true,
    };

    let mut symbols = Vec::with_capacity(natom);
    let mut xcart = Vec::with_capacity(natom);
    let mut fcart = Vec::with_capacity(natom);
    for _ in 0..natom {
        let line = next_line(lines, line_no)?
            .ok_or_else(|| bad(*line_no, format!("frame {frame} truncated")))?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(bad(*line_no, "atom line needs a symbol and 3 coordinates"));
        }
        let nums = parts[1..]
            .iter()
            .map(|p| p.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| bad(*line_no, "bad number on atom line"))?;
        symbols.push(parts[0].to_string());
        xcart.push([nums[0], nums[1], nums[2]]);
        if nums.len() >= 6 {
            fcart.push([nums[3], nums[4], nums[5]]);
        }
    }

    let mut snapshot = Snapshot::from_cartesian(acell, rprimd, xcart, time)?;
    if fcart.len() == natom {
        snapshot = snapshot.with_forces(fcart);
    } else if !fcart.is_empty() {
        return Err(bad(*line_no, format!("frame {frame} has forces on only some atoms")));
    }
    if let Some(e) = energy {
        snapshot = snapshot.with_etotal(e);
    }
    if let Some(s) = stress {
        snapshot = snapshot.with_stress(s);
    }
    Ok(Some(RawFrame {
        symbols,
        snapshot,
        periodic,
    }))
}

/// Split `key=value` pairs; values may be double-quoted. Keys are lowercased.
fn parse_comment(line: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let mut rest = line.trim();
    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else { break };
        let key = rest[..eq].trim().to_ascii_lowercase();
        let after = rest[eq + 1..].trim_start();
        let (value, tail) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(char::is_whitespace) {
                Some(end) => (&after[..end], &after[end..]),
                None => (after, ""),
            }
        };
        if !key.is_empty() {
            out.insert(key, value.to_string());
        }
        rest = tail.trim_start();
    }
    out
}

fn parse_floats<const N: usize>(text: &str) -> Option<[f64; N]> {
    let mut out = [0.0; N];
    let mut it = text.split_whitespace();
    for slot in out.iter_mut() {
        *slot = it.next()?.parse().ok()?;
    }
    if it.next().is_some() {
        return None;
    }
    Some(out)
}

/// Write the given steps of `traj` as extended XYZ.
pub fn write_xyz(
    traj: &Trajectory,
    path: impl AsRef<Path>,
    steps: impl IntoIterator<Item = usize>,
) -> TrajResult<usize> {
    let mut symbols = Vec::with_capacity(traj.natom());
    for atom in 0..traj.natom() {
        let z = traj.znucl_of(atom)?;
        let sym = symbol(z)
            .ok_or_else(|| TrajError::Unsupported(format!("no element symbol for Z = {z}")))?;
        symbols.push(sym);
    }
    let pbc = if traj.is_periodic() { "T T T" } else { "F F F" };

    let mut out = BufWriter::new(File::create(path.as_ref())?);
    let mut written = 0;
    for t in steps {
        let snap = traj.snapshot(t)?;
        let r = snap.rprimd();
        writeln!(out, "{}", traj.natom())?;
        write!(
            out,
            "Lattice=\"{} {} {} {} {} {} {} {} {}\" Time={}",
            r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2],
            snap.time()
        )?;
        let acell = snap.acell();
        if acell != [1.0; 3] {
            write!(out, " Acell=\"{} {} {}\"", acell[0], acell[1], acell[2])?;
        }
        if let Some(e) = snap.etotal() {
            write!(out, " Energy={e}")?;
        }
        if let Some(s) = snap.stress() {
            write!(out, " Stress=\"{} {} {} {} {} {}\"", s[0], s[1], s[2], s[3], s[4], s[5])?;
        }
        writeln!(out, " pbc=\"{pbc}\"")?;
        let forces = snap.fcart();
        for (i, (sym, x)) in symbols.iter().zip(snap.xcart()).enumerate() {
            write!(out, "{sym} {} {} {}", x[0], x[1], x[2])?;
            if let Some(f) = forces {
                write!(out, " {} {} {}", f[i][0], f[i][1], f[i][2])?;
            }
            writeln!(out)?;
        }
        written += 1;
    }
    out.flush()?;
    Ok(written)
}
