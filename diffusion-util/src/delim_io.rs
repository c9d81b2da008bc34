use log::info;
use nalgebra::DMatrix;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

type Mat = DMatrix<f32>;

/// A dense matrix with row names and column names.
pub struct MatWithNames {
    pub rows: Vec<Box<str>>,
    pub cols: Vec<Box<str>>,
    pub mat: Mat,
}

/// Read a TSV matrix whose first line is a header and whose first column
/// holds row names. Empty lines and `#`-prefixed lines are skipped.
pub fn read_named_tsv(path: &str) -> anyhow::Result<MatWithNames> {
    let file =
        File::open(path).map_err(|e| anyhow::anyhow!("failed to open {}: {}", path, e))?;
    let reader = BufReader::new(file);

    let mut lines = reader.lines();

    let header = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                if line.trim().is_empty() || line.starts_with('#') {
                    continue;
                }
                break line;
            }
            None => anyhow::bail!("{} is empty", path),
        }
    };

    let cols: Vec<Box<str>> = header
        .split('\t')
        .skip(1)
        .map(|s| s.trim().into())
        .collect();
    anyhow::ensure!(!cols.is_empty(), "{} header has no data columns", path);

    let mut rows: Vec<Box<str>> = Vec::new();
    let mut values: Vec<f32> = Vec::new();

    for line in lines {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split('\t');
        let name = fields
            .next()
            .ok_or_else(|| anyhow::anyhow!("missing row name in {}", path))?;
        rows.push(name.trim().into());

        let start = values.len();
        for field in fields {
            let v: f32 = field.trim().parse().map_err(|e| {
                anyhow::anyhow!("bad number {:?} in {} row {}: {}", field, path, name, e)
            })?;
            values.push(v);
        }
        anyhow::ensure!(
            values.len() - start == cols.len(),
            "row {} of {} has {} values, expected {}",
            name,
            path,
            values.len() - start,
            cols.len()
        );
    }

    anyhow::ensure!(!rows.is_empty(), "{} has no data rows", path);

    let mat = Mat::from_row_iterator(rows.len(), cols.len(), values.into_iter());
    info!("Read {} x {} matrix from {}", mat.nrows(), mat.ncols(), path);

    Ok(MatWithNames { rows, cols, mat })
}

/// Write a matrix as TSV with a header line and a leading row-name column.
pub fn write_named_tsv(
    path: &str,
    mat: &Mat,
    rows: &[Box<str>],
    cols: &[Box<str>],
) -> anyhow::Result<()> {
    anyhow::ensure!(
        rows.len() == mat.nrows() && cols.len() == mat.ncols(),
        "names ({} x {}) do not match matrix ({} x {})",
        rows.len(),
        cols.len(),
        mat.nrows(),
        mat.ncols()
    );

    let file =
        File::create(path).map_err(|e| anyhow::anyhow!("failed to create {}: {}", path, e))?;
    let mut buf = BufWriter::new(file);

    write!(buf, "row")?;
    for c in cols {
        write!(buf, "\t{}", c)?;
    }
    writeln!(buf)?;

    for (i, name) in rows.iter().enumerate() {
        write!(buf, "{}", name)?;
        for j in 0..mat.ncols() {
            write!(buf, "\t{}", mat[(i, j)])?;
        }
        writeln!(buf)?;
    }
    buf.flush()?;

    info!("Wrote {} x {} matrix to {}", mat.nrows(), mat.ncols(), path);
    Ok(())
}

/// Read a two-column TSV of (row name, label); `#`-prefixed and empty
/// lines are skipped.
pub fn read_label_tsv(path: &str) -> anyhow::Result<Vec<(Box<str>, Box<str>)>> {
    let file =
        File::open(path).map_err(|e| anyhow::anyhow!("failed to open {}: {}", path, e))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split('\t');
        let name = fields
            .next()
            .ok_or_else(|| anyhow::anyhow!("missing row name in {}", path))?;
        let label = fields
            .next()
            .ok_or_else(|| anyhow::anyhow!("missing label for {} in {}", name, path))?;
        out.push((name.trim().into(), label.trim().into()));
    }

    anyhow::ensure!(!out.is_empty(), "{} has no label rows", path);
    Ok(out)
}
