//! Diffuse bus decorrelation.
//!
//! Every output channel gets its own random-phase all-pass FIR filter,
//! seeded by the position of the channel name in the sorted channel list so
//! a given layout always gets the same filters. The diffuse bus is filtered
//! by FFT overlap-add; the direct bus is delayed by the filters' group delay
//! so both paths stay aligned.

use std::f64::consts::PI;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::error::{Result, SpatialError};
use crate::layout::Layout;

/// Taps in every decorrelation filter.
pub const DECORRELATOR_LENGTH: usize = 512;

/// Delay applied to the direct bus, in samples.
pub const COMPENSATION_DELAY: usize = (DECORRELATOR_LENGTH - 1) / 2;

/// Designs one all-pass filter with unit magnitude and uniformly random
/// phase in every bin between DC and Nyquist.
pub fn decorrelation_filter(seed: u64) -> Result<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut planner = RealFftPlanner::<f64>::new();
    let inverse = planner.plan_fft_inverse(DECORRELATOR_LENGTH);

    let mut spectrum = inverse.make_input_vec();
    let nyquist = DECORRELATOR_LENGTH / 2;
    spectrum[0] = Complex::new(1.0, 0.0);
    for bin in &mut spectrum[1..nyquist] {
        *bin = Complex::from_polar(1.0, 2.0 * PI * rng.gen::<f64>());
    }
    spectrum[nyquist] = Complex::new(1.0, 0.0);

    let mut taps = inverse.make_output_vec();
    inverse.process(&mut spectrum, &mut taps)?;
    let scale = 1.0 / DECORRELATOR_LENGTH as f64;
    for tap in &mut taps {
        *tap *= scale;
    }
    Ok(taps)
}

/// One filter per layout channel, LFE included, in layout order.
pub fn layout_filters(layout: &Layout) -> Result<Vec<Vec<f64>>> {
    let mut sorted: Vec<&str> = layout.channels.iter().map(|c| c.name.as_str()).collect();
    sorted.sort_unstable();
    layout
        .channels
        .iter()
        .map(|channel| {
            let seed = sorted
                .binary_search(&channel.name.as_str())
                .unwrap_or_else(|index| index);
            decorrelation_filter(seed as u64)
        })
        .collect()
}

pub struct Decorrelator {
    block_size: usize,
    fft_size: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    /// Filter spectra at `fft_size`.
    filters: Vec<Vec<Complex<f32>>>,
    /// Convolution tails still to be added to the next blocks.
    tails: Vec<Vec<f32>>,
    delay_lines: Vec<Vec<f32>>,
    delay_position: usize,
    time: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    forward_scratch: Vec<Complex<f32>>,
    inverse_scratch: Vec<Complex<f32>>,
}

impl Decorrelator {
    pub fn new(layout: &Layout, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(SpatialError::invalid_config(
                "decorrelator block size must be greater than zero",
            ));
        }
        let fft_size = (block_size + DECORRELATOR_LENGTH - 1).next_power_of_two();
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let mut time = forward.make_input_vec();
        let mut spectrum = forward.make_output_vec();
        let mut forward_scratch = forward.make_scratch_vec();
        let filters = layout_filters(layout)?
            .iter()
            .map(|taps| -> Result<Vec<Complex<f32>>> {
                time.fill(0.0);
                for (slot, tap) in time.iter_mut().zip(taps) {
                    *slot = *tap as f32;
                }
                forward.process_with_scratch(&mut time, &mut spectrum, &mut forward_scratch)?;
                Ok(spectrum.clone())
            })
            .collect::<Result<Vec<_>>>()?;

        let channels = layout.channel_count();
        let inverse_scratch = inverse.make_scratch_vec();
        Ok(Self {
            block_size,
            fft_size,
            forward,
            inverse,
            filters,
            tails: vec![vec![0.0; DECORRELATOR_LENGTH - 1]; channels],
            delay_lines: vec![vec![0.0; COMPENSATION_DELAY]; channels],
            delay_position: 0,
            time,
            spectrum,
            forward_scratch,
            inverse_scratch,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Delays the first `block_size` samples of every `direct` bus and
    /// filters the same span of every `diffuse` bus, in place.
    ///
    /// # Panics
    ///
    /// Panics if the bus counts differ from the layout or a bus is shorter
    /// than the block.
    pub fn process<B: AsMut<[f32]>>(
        &mut self,
        direct: &mut [B],
        diffuse: &mut [B],
    ) -> Result<()> {
        let channels = self.filters.len();
        assert_eq!(direct.len(), channels, "direct bus count must match the layout");
        assert_eq!(diffuse.len(), channels, "diffuse bus count must match the layout");
        let block = self.block_size;

        for channel in 0..channels {
            let line = &mut self.delay_lines[channel];
            let mut position = self.delay_position;
            for sample in &mut direct[channel].as_mut()[..block] {
                let delayed = line[position];
                line[position] = *sample;
                *sample = delayed;
                position += 1;
                if position == line.len() {
                    position = 0;
                }
            }

            let bus = &mut diffuse[channel].as_mut()[..block];
            let tail = &mut self.tails[channel];
            if bus.iter().chain(tail.iter()).all(|s| *s == 0.0) {
                continue;
            }

            self.time.fill(0.0);
            self.time[..block].copy_from_slice(bus);
            self.forward.process_with_scratch(
                &mut self.time,
                &mut self.spectrum,
                &mut self.forward_scratch,
            )?;
            for (bin, filter) in self.spectrum.iter_mut().zip(&self.filters[channel]) {
                *bin *= *filter;
            }
            // the real inverse wants purely real DC and Nyquist bins
            if let Some(dc) = self.spectrum.first_mut() {
                dc.im = 0.0;
            }
            if let Some(nyquist) = self.spectrum.last_mut() {
                nyquist.im = 0.0;
            }
            self.inverse.process_with_scratch(
                &mut self.spectrum,
                &mut self.time,
                &mut self.inverse_scratch,
            )?;
            let scale = 1.0 / self.fft_size as f32;
            for sample in self.time.iter_mut() {
                *sample *= scale;
            }

            let carried = tail.iter().chain(std::iter::repeat(&0.0));
            for ((out, y), c) in bus.iter_mut().zip(&self.time).zip(carried) {
                *out = y + c;
            }
            if block < tail.len() {
                tail.copy_within(block.., 0);
                let kept = tail.len() - block;
                tail[kept..].fill(0.0);
            } else {
                tail.fill(0.0);
            }
            for (slot, y) in tail.iter_mut().zip(&self.time[block..]) {
                *slot += y;
            }
        }

        self.delay_position = (self.delay_position + block) % COMPENSATION_DELAY;
        Ok(())
    }

    /// Clears the delay lines and convolution tails.
    pub fn reset(&mut self) {
        for buffer in self.tails.iter_mut().chain(self.delay_lines.iter_mut()) {
            buffer.fill(0.0);
        }
        self.delay_position = 0;
    }
}
