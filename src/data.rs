// 入力はタブ区切りで 1 行 1 観測, 続けてその時刻の真値:
//   L  px   py   timestamp          gt_px  gt_py  gt_vx  gt_vy
//   R  rho  phi  rho_dot  timestamp gt_px  gt_py  gt_vx  gt_vy

use crate::error::{Error, Result};
use crate::measurement::{Measurement, SensorKind};
use crate::ukf::{to_cartesian, State};
use serde::Serialize;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub measurement: Measurement,
    pub ground_truth: na::Vector4<f64>,
}

pub struct SampleReader<R> {
    inner: csv::Reader<R>,
    record: csv::StringRecord,
}

impl SampleReader<std::fs::File> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_reader(std::fs::File::open(path)?))
    }
}

impl<R: io::Read> SampleReader<R> {
    pub fn from_reader(rdr: R) -> Self {
        let inner = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(rdr);
        Self {
            inner,
            record: csv::StringRecord::new(),
        }
    }
}

impl<R: io::Read> Iterator for SampleReader<R> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.read_record(&mut self.record) {
                Ok(false) => return None,
                Err(e) => return Some(Err(e.into())),
                Ok(true) => {}
            }
            // 空行は読み飛ばす
            if self.record.iter().all(str::is_empty) {
                continue;
            }
            let line = self.record.position().map_or(0, |p| p.line());
            return Some(parse_record(&self.record, line));
        }
    }
}

// line はエラー表示用
pub fn parse_record(record: &csv::StringRecord, line: u64) -> Result<Sample> {
    let fields = Fields { record, line };
    let (measurement, gt) = match fields.get(0)? {
        "L" => (
            Measurement::laser(fields.timestamp(3)?, fields.float(1)?, fields.float(2)?),
            4,
        ),
        "R" => (
            Measurement::radar(
                fields.timestamp(4)?,
                fields.float(1)?,
                fields.float(2)?,
                fields.float(3)?,
            ),
            5,
        ),
        other => return Err(fields.error(format!("unknown sensor type {other:?}"))),
    };
    let ground_truth = na::vector![
        fields.float(gt)?,
        fields.float(gt + 1)?,
        fields.float(gt + 2)?,
        fields.float(gt + 3)?
    ];

    Ok(Sample {
        measurement,
        ground_truth,
    })
}

struct Fields<'a> {
    record: &'a csv::StringRecord,
    line: u64,
}

impl<'a> Fields<'a> {
    fn error(&self, message: String) -> Error {
        Error::Parse {
            line: self.line,
            message,
        }
    }

    fn get(&self, i: usize) -> Result<&'a str> {
        self.record
            .get(i)
            .ok_or_else(|| self.error(format!("missing field {}", i + 1)))
    }

    fn float(&self, i: usize) -> Result<f64> {
        let s = self.get(i)?;
        s.parse()
            .map_err(|e| self.error(format!("field {}: {s:?}: {e}", i + 1)))
    }

    fn timestamp(&self, i: usize) -> Result<u64> {
        let s = self.get(i)?;
        s.parse()
            .map_err(|e| self.error(format!("timestamp {s:?}: {e}")))
    }
}

// 推定ログの 1 行
#[derive(Debug, Clone, Serialize)]
pub struct EstimateRecord {
    pub timestamp: u64,
    pub sensor: &'static str,
    pub px: f64,
    pub py: f64,
    pub v: f64,
    pub yaw: f64,
    pub yaw_rate: f64,
    pub vx: f64,
    pub vy: f64,
    pub nis: Option<f64>,
    pub meas_px: f64,
    pub meas_py: f64,
    pub gt_px: f64,
    pub gt_py: f64,
    pub gt_vx: f64,
    pub gt_vy: f64,
    pub rmse_px: f64,
    pub rmse_py: f64,
    pub rmse_vx: f64,
    pub rmse_vy: f64,
}

impl EstimateRecord {
    pub fn new(
        sample: &Sample,
        x: &State,
        nis: Option<f64>,
        rmse: &na::Vector4<f64>,
    ) -> Self {
        let m = &sample.measurement;
        let cart = to_cartesian(x);
        let meas = m.position();
        let gt = &sample.ground_truth;
        Self {
            timestamp: m.timestamp,
            sensor: m.kind().tag(),
            px: x[0],
            py: x[1],
            v: x[2],
            yaw: x[3],
            yaw_rate: x[4],
            vx: cart[2],
            vy: cart[3],
            nis,
            meas_px: meas[0],
            meas_py: meas[1],
            gt_px: gt[0],
            gt_py: gt[1],
            gt_vx: gt[2],
            gt_vy: gt[3],
            rmse_px: rmse[0],
            rmse_py: rmse[1],
            rmse_vx: rmse[2],
            rmse_vy: rmse[3],
        }
    }

    pub fn kind(&self) -> Option<SensorKind> {
        match self.sensor {
            "L" => Some(SensorKind::Laser),
            "R" => Some(SensorKind::Radar),
            _ => None,
        }
    }
}

pub struct EstimateWriter<W: io::Write> {
    inner: csv::Writer<W>,
}

impl EstimateWriter<std::fs::File> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            inner: csv::Writer::from_path(path)?,
        })
    }
}

impl<W: io::Write> EstimateWriter<W> {
    pub fn from_writer(wtr: W) -> Self {
        Self {
            inner: csv::Writer::from_writer(wtr),
        }
    }

    pub fn write(&mut self, record: &EstimateRecord) -> Result<()> {
        self.inner.serialize(record)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.inner.into_inner().map_err(|e| Error::Io(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DATA: &str = "\
L\t3.122427e-01\t5.803398e-01\t1477010443000000\t6.000000e-01\t6.000000e-01\t5.199937e+00\t0\n\
R\t1.014892e+00\t5.543292e-01\t4.892807e+00\t1477010443050000\t8.599968e-01\t6.000449e-01\t5.199747e+00\t1.796856e-03\n\
\n\
L\t1.173848e+00\t4.810729e-01\t1477010443100000\t1.119984e+00\t6.002246e-01\t5.199429e+00\t5.389957e-03\n";

    #[test]
    fn reads_laser_and_radar_lines() {
        let samples: Vec<Sample> = SampleReader::from_reader(DATA.as_bytes())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(samples.len(), 3);

        let first = &samples[0];
        assert_eq!(first.measurement.kind(), SensorKind::Laser);
        assert_eq!(first.measurement.timestamp, 1477010443000000);
        assert_relative_eq!(first.measurement.position()[0], 0.3122427);
        assert_relative_eq!(first.ground_truth[2], 5.199937);

        let second = &samples[1];
        assert_eq!(second.measurement, Measurement::radar(1477010443050000, 1.014892, 0.5543292, 4.892807));
        assert_relative_eq!(second.ground_truth[3], 1.796856e-3);
        assert_eq!(samples[2].measurement.timestamp, 1477010443100000);
    }

    #[test]
    fn reports_line_of_bad_input() {
        let data = "L\t1\t2\t100\t0\t0\t0\t0\nX\t1\t2\t3\n";
        let results: Vec<Result<Sample>> = SampleReader::from_reader(data.as_bytes()).collect();
        assert!(results[0].is_ok());
        match &results[1] {
            Err(Error::Parse { line, message }) => {
                assert_eq!(*line, 2);
                assert!(message.contains("unknown sensor"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let data = "R\t1\t0.5\t2\t100\t0\t0\n";
        let r = SampleReader::from_reader(data.as_bytes()).next().unwrap();
        assert!(matches!(r, Err(Error::Parse { line: 1, .. })));

        let data = "L\t1\tabc\t100\t0\t0\t0\t0\n";
        let r = SampleReader::from_reader(data.as_bytes()).next().unwrap();
        assert!(matches!(r, Err(Error::Parse { .. })));
    }

    #[test]
    fn writes_header_and_rows() {
        let sample = Sample {
            measurement: Measurement::laser(10, 1.0, 2.0),
            ground_truth: na::vector![1.0, 2.0, 0.5, 0.0],
        };
        let x = na::vector![1.0, 2.0, 0.5, 0.0, 0.0];
        let record = EstimateRecord::new(&sample, &x, None, &na::Vector4::zeros());
        assert_eq!(record.kind(), Some(SensorKind::Laser));

        let mut wtr = EstimateWriter::from_writer(Vec::new());
        wtr.write(&record).unwrap();
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        let mut lines = out.lines();
        assert!(lines.next().unwrap().starts_with("timestamp,sensor,px,py,v,yaw"));
        assert!(lines.next().unwrap().starts_with("10,L,1.0,2.0,0.5,0.0,0.0,0.5,0.0,,"));
    }
}
