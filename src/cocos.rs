//! Coordinate conventions (COCOS)
//!
//! Quantities are stored in COCOS 11. When the environment selects another
//! input/output convention, values tagged with a [`CocosLabel`] are scaled on
//! the way in and scaled back on the way out.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{OdsError, OdsResult};

/// Convention used for storage
pub const INTERNAL_COCOS: u8 = 11;

/// How a quantity transforms between conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CocosLabel {
    PsiLike,
    DpsiLike,
    IpLike,
    B0Like,
    QLike,
}

/// Sign and scale parameters of one convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cocos {
    pub index: u8,
    pub exp_bp: i32,
    pub sigma_bp: i32,
    pub sigma_rphiz: i32,
    pub sigma_rhothetaphi: i32,
}

impl Cocos {
    /// Parameters for COCOS 1-8 and 11-18
    pub fn new(index: u8) -> OdsResult<Self> {
        let (exp_bp, base) = match index {
            1..=8 => (0, index),
            11..=18 => (1, index - 10),
            _ => {
                return Err(OdsError::Configuration(format!(
                    "Invalid COCOS index {} (expected 1-8 or 11-18)",
                    index
                )));
            }
        };
        let (sigma_bp, sigma_rphiz, sigma_rhothetaphi) = match base {
            1 => (1, 1, 1),
            2 => (1, -1, 1),
            3 => (-1, 1, -1),
            4 => (-1, -1, -1),
            5 => (1, 1, -1),
            6 => (1, -1, -1),
            7 => (-1, 1, 1),
            _ => (-1, -1, 1),
        };
        Ok(Self {
            index,
            exp_bp,
            sigma_bp,
            sigma_rphiz,
            sigma_rhothetaphi,
        })
    }
}

/// Multiplicative factors taking values from one convention to another
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CocosTransform {
    pub psi_like: f64,
    pub dpsi_like: f64,
    pub ip_like: f64,
    pub b0_like: f64,
    pub q_like: f64,
}

impl CocosTransform {
    /// Factors for `from -> to`, with plasma current and toroidal field
    /// directions held fixed
    pub fn between(from: u8, to: u8) -> OdsResult<Self> {
        let cin = Cocos::new(from)?;
        let cout = Cocos::new(to)?;

        let sigma_ip = (cin.sigma_rphiz * cout.sigma_rphiz) as f64;
        let sigma_b0 = (cin.sigma_rphiz * cout.sigma_rphiz) as f64;
        let sigma_bp = (cin.sigma_bp * cout.sigma_bp) as f64;
        let sigma_rhothetaphi = (cin.sigma_rhothetaphi * cout.sigma_rhothetaphi) as f64;
        let two_pi = (2.0 * PI).powi(cout.exp_bp - cin.exp_bp);

        Ok(Self {
            psi_like: sigma_ip * sigma_bp * two_pi,
            dpsi_like: sigma_ip * sigma_bp / two_pi,
            ip_like: sigma_ip,
            b0_like: sigma_b0,
            q_like: sigma_ip * sigma_b0 * sigma_rhothetaphi,
        })
    }

    pub fn factor(&self, label: CocosLabel) -> f64 {
        match label {
            CocosLabel::PsiLike => self.psi_like,
            CocosLabel::DpsiLike => self.dpsi_like,
            CocosLabel::IpLike => self.ip_like,
            CocosLabel::B0Like => self.b0_like,
            CocosLabel::QLike => self.q_like,
        }
    }
}

/// Factor applied when writing a value given in convention `cocosio`
pub fn input_factor(cocosio: u8, label: CocosLabel) -> OdsResult<f64> {
    Ok(CocosTransform::between(cocosio, INTERNAL_COCOS)?.factor(label))
}

/// Factor applied when reading a value back into convention `cocosio`
pub fn output_factor(cocosio: u8, label: CocosLabel) -> OdsResult<f64> {
    Ok(CocosTransform::between(INTERNAL_COCOS, cocosio)?.factor(label))
}
