//! Text serialization of a trained classifier.
//!
//! Layout, one record after another:
//!
//! ```text
//! 2 classes
//! circle
//! square
//! V 3            <- mean of circle
//! 0.5 1.25 -3
//! V 3            <- weight of circle
//! ...
//! V 2            <- constants, one per class
//! ...
//! M 3 3          <- inverse covariance
//! ...
//! ```
//!
//! Numbers use the shortest representation that parses back to the same
//! `f64`, so a saved classifier reloads bit for bit.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use log::info;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use super::error::ClassifierError;
use super::model::{Classifier, TrainedClass};
use crate::config::TrainingConfig;

impl Classifier {
    /// Writes the trained state to `writer`.
    pub fn save<W: Write>(&self, mut writer: W) -> Result<(), ClassifierError> {
        writeln!(writer, "{} classes", self.classes.len())?;
        for class in &self.classes {
            writeln!(writer, "{}", class.name)?;
        }
        for class in &self.classes {
            write_vector(&mut writer, class.mean.view())?;
            write_vector(&mut writer, class.weight.view())?;
        }
        let constants: Array1<f64> = self.classes.iter().map(|c| c.constant).collect();
        write_vector(&mut writer, constants.view())?;
        write_matrix(&mut writer, self.inverse_covariance.view())?;
        writer.flush()?;
        Ok(())
    }

    /// Reads a classifier previously written by [`save`](Self::save).
    ///
    /// The result is ready to classify; per-class example counts are not
    /// stored and come back as `None`.
    ///
    /// # Errors
    /// - `Persistence` if the record is malformed, truncated or inconsistent
    /// - `Io` if reading fails
    pub fn load<R: BufRead>(reader: R) -> Result<Self, ClassifierError> {
        let mut records = RecordReader::new(reader);

        let count = records.read_class_count()?;
        let mut names = Vec::new();
        for i in 0..count {
            let name = records.next_line(&format!("name of class {}", i))?;
            if name.is_empty() {
                return Err(records.error(format!("class {} has an empty name", i)));
            }
            names.push(name);
        }

        let mut classes = Vec::with_capacity(names.len());
        for (index, name) in names.into_iter().enumerate() {
            let mean = records.read_vector(&format!("mean of '{}'", name))?;
            let weight = records.read_vector(&format!("weight of '{}'", name))?;
            classes.push(TrainedClass {
                name,
                index,
                mean,
                weight,
                constant: 0.0,
                example_count: None,
            });
        }

        let constants = records.read_vector("constants")?;
        if constants.len() != count {
            return Err(records.error(format!("expected {} constants, found {}", count, constants.len())));
        }
        for (class, constant) in classes.iter_mut().zip(constants.iter()) {
            class.constant = *constant;
        }

        let inverse_covariance = records.read_matrix("inverse covariance")?;
        let nfeatures = inverse_covariance.nrows();
        if nfeatures == 0 || inverse_covariance.ncols() != nfeatures {
            return Err(records.error(format!(
                "inverse covariance must be square and non-empty, found {}x{}",
                inverse_covariance.nrows(),
                inverse_covariance.ncols()
            )));
        }
        if let Some(class) = classes
            .iter()
            .find(|c| c.mean.len() != nfeatures || c.weight.len() != nfeatures)
        {
            return Err(records.error(format!(
                "class '{}' vectors do not match {} features",
                class.name, nfeatures
            )));
        }

        info!("Loaded classifier with {} classes and {} features", count, nfeatures);
        Ok(Classifier {
            nfeatures,
            classes,
            inverse_covariance,
            config: TrainingConfig::default(),
        })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ClassifierError> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.save(BufWriter::new(file))?;
        info!("Saved classifier to {:?}", path);
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        info!("Reading classifier from {:?}", path);
        Self::load(BufReader::new(File::open(path)?))
    }
}

fn join_values<'a>(values: impl Iterator<Item = &'a f64>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
}

fn write_vector<W: Write>(writer: &mut W, v: ArrayView1<f64>) -> Result<(), ClassifierError> {
    writeln!(writer, "V {}", v.len())?;
    writeln!(writer, "{}", join_values(v.iter()))?;
    Ok(())
}

fn write_matrix<W: Write>(writer: &mut W, m: ArrayView2<f64>) -> Result<(), ClassifierError> {
    writeln!(writer, "M {} {}", m.nrows(), m.ncols())?;
    for row in m.rows() {
        writeln!(writer, "{}", join_values(row.iter()))?;
    }
    Ok(())
}

struct RecordReader<R> {
    lines: Lines<R>,
    line: usize,
}

impl<R: BufRead> RecordReader<R> {
    fn new(reader: R) -> Self {
        Self { lines: reader.lines(), line: 0 }
    }

    fn error(&self, reason: impl Into<String>) -> ClassifierError {
        ClassifierError::Persistence { line: self.line, reason: reason.into() }
    }

    fn next_line(&mut self, what: &str) -> Result<String, ClassifierError> {
        match self.lines.next() {
            Some(line) => {
                self.line += 1;
                let mut line = line?;
                if line.ends_with('\r') {
                    line.pop();
                }
                Ok(line)
            }
            None => Err(ClassifierError::Persistence {
                line: self.line + 1,
                reason: format!("unexpected end of input while reading {}", what),
            }),
        }
    }

    fn read_class_count(&mut self) -> Result<usize, ClassifierError> {
        let header = self.next_line("class count")?;
        let count = header
            .split_whitespace()
            .next()
            .and_then(|token| token.parse::<usize>().ok())
            .ok_or_else(|| self.error(format!("invalid class count {:?}", header)))?;
        if count == 0 {
            return Err(self.error("classifier has no classes"));
        }
        let limit = TrainingConfig::default().max_classes;
        if count > limit {
            return Err(self.error(format!("{} classes exceeds the limit of {}", count, limit)));
        }
        Ok(count)
    }

    fn read_header(&mut self, tag: &str, fields: usize, what: &str) -> Result<Vec<usize>, ClassifierError> {
        let header = self.next_line(what)?;
        let mut tokens = header.split_whitespace();
        let dims: Option<Vec<usize>> = if tokens.next() == Some(tag) {
            tokens.map(|t| t.parse::<usize>().ok()).collect()
        } else {
            None
        };
        match dims {
            Some(dims) if dims.len() == fields => Ok(dims),
            _ => Err(self.error(format!("expected '{}' header for {}, found {:?}", tag, what, header))),
        }
    }

    fn read_values(&mut self, expected: usize, what: &str) -> Result<Vec<f64>, ClassifierError> {
        let line = self.next_line(what)?;
        let values = line
            .split_whitespace()
            .map(|t| t.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.error(format!("bad number in {}: {}", what, e)))?;
        if values.len() != expected {
            return Err(self.error(format!("expected {} values for {}, found {}", expected, what, values.len())));
        }
        Ok(values)
    }

    fn read_vector(&mut self, what: &str) -> Result<Array1<f64>, ClassifierError> {
        let len = self.read_header("V", 1, what)?[0];
        Ok(Array1::from(self.read_values(len, what)?))
    }

    fn read_matrix(&mut self, what: &str) -> Result<Array2<f64>, ClassifierError> {
        let dims = self.read_header("M", 2, what)?;
        let (rows, cols) = (dims[0], dims[1]);
        if rows.checked_mul(cols).is_none() {
            return Err(self.error(format!("matrix of {}x{} for {} is too large", rows, cols, what)));
        }
        // sized by the rows actually read, not by the header
        let mut data = Vec::new();
        for _ in 0..rows {
            data.extend(self.read_values(cols, what)?);
        }
        Array2::from_shape_vec((rows, cols), data).map_err(|e| self.error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> Classifier {
        let inverse_covariance = array![[2.0, -0.25], [-0.25, 1.0 / 3.0]];
        let classes = vec![
            TrainedClass {
                name: "circle".into(),
                index: 0,
                mean: array![0.1, -7.5e-9],
                weight: array![0.2, 1e300],
                constant: -0.1,
                example_count: Some(4),
            },
            TrainedClass {
                name: "check mark".into(),
                index: 1,
                mean: array![3.0, 4.0],
                weight: array![-1.0, 0.0],
                constant: 12.5,
                example_count: Some(6),
            },
        ];
        Classifier { nfeatures: 2, classes, inverse_covariance, config: TrainingConfig::default() }
    }

    fn saved(classifier: &Classifier) -> String {
        let mut buf = Vec::new();
        classifier.save(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_layout() {
        let text = saved(&sample());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "2 classes");
        assert_eq!(lines[1], "circle");
        assert_eq!(lines[2], "check mark");
        assert_eq!(lines[3], "V 2");
        assert_eq!(lines[4], "0.1 -0.0000000075");
        assert_eq!(lines[lines.len() - 3], "M 2 2");
    }

    #[test]
    fn test_round_trip_is_exact() -> Result<(), ClassifierError> {
        let original = sample();
        let loaded = Classifier::load(saved(&original).as_bytes())?;
        assert_eq!(loaded.nfeatures, 2);
        assert_eq!(loaded.inverse_covariance, original.inverse_covariance);
        for (a, b) in loaded.classes.iter().zip(&original.classes) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.index, b.index);
            assert_eq!(a.mean, b.mean);
            assert_eq!(a.weight, b.weight);
            assert_eq!(a.constant, b.constant);
            assert_eq!(a.example_count, None);
        }
        Ok(())
    }

    #[test]
    fn test_bad_class_count() {
        let result = Classifier::load("two classes\n".as_bytes());
        assert!(matches!(result, Err(ClassifierError::Persistence { line: 1, .. })));

        let result = Classifier::load("0 classes\n".as_bytes());
        assert!(matches!(result, Err(ClassifierError::Persistence { .. })));

        let result = Classifier::load("".as_bytes());
        assert!(matches!(result, Err(ClassifierError::Persistence { line: 1, .. })));
    }

    #[test]
    fn test_truncated_record() {
        let text = saved(&sample());
        let lines: Vec<&str> = text.lines().collect();
        for cut in 1..lines.len() {
            let truncated = lines[..cut].join("\n");
            assert!(
                matches!(Classifier::load(truncated.as_bytes()), Err(ClassifierError::Persistence { .. })),
                "truncation after {} lines was accepted",
                cut
            );
        }
    }

    #[test]
    fn test_malformed_numbers_and_dimensions() {
        let text = saved(&sample()).replacen("0.1 -0.0000000075", "0.1 oops", 1);
        assert!(matches!(
            Classifier::load(text.as_bytes()),
            Err(ClassifierError::Persistence { line: 5, .. })
        ));

        let text = saved(&sample()).replacen("V 2\n0.1 -0.0000000075", "V 3\n0.1 -0.0000000075 1", 1);
        assert!(matches!(Classifier::load(text.as_bytes()), Err(ClassifierError::Persistence { .. })));

        let text = saved(&sample()).replacen("M 2 2", "X 2 2", 1);
        assert!(matches!(Classifier::load(text.as_bytes()), Err(ClassifierError::Persistence { .. })));
    }

    #[test]
    fn test_oversized_headers() {
        let result = Classifier::load("18446744073709551615 classes\n".as_bytes());
        assert!(matches!(result, Err(ClassifierError::Persistence { line: 1, .. })));

        let result = Classifier::load("101 classes\n".as_bytes());
        assert!(matches!(result, Err(ClassifierError::Persistence { line: 1, .. })));

        let text = saved(&sample());
        let overflowing = text.replacen("M 2 2", "M 4294967296 4294967296", 1);
        assert!(matches!(Classifier::load(overflowing.as_bytes()), Err(ClassifierError::Persistence { .. })));

        let huge = text.replacen("M 2 2", "M 100000 100000", 1);
        assert!(matches!(Classifier::load(huge.as_bytes()), Err(ClassifierError::Persistence { .. })));

        let huge_vector = text.replacen("V 2", "V 18446744073709551615", 1);
        assert!(matches!(
            Classifier::load(huge_vector.as_bytes()),
            Err(ClassifierError::Persistence { line: 5, .. })
        ));
    }
}
