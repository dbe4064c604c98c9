//! Characteristic X-ray emission line energies by atomic number.
//!
//! Used to pick the windows handed to `energy_window_sum`. The table holds
//! the principal K, L and M lines for lithium through americium, in eV, as
//! tabulated in the X-ray Data Booklet (table 1-2). Results are reported in
//! keV, the unit of the spectral axes the engine calibrates.

use serde::Serialize;

use crate::error::{EngineError, Result};

/// Heaviest element accepted by the lookup.
pub const MAX_ATOMIC_NUMBER: u32 = 118;

const FIRST_TABULATED: u32 = 3;

/// Ka1, Ka2, Kb1, La1, La2, Lb1, Lb2, Lg1, Ma1 in eV; 0 marks a missing line.
#[rustfmt::skip]
const LINE_TABLE: [[f64; 9]; 93] = [
    [54.3, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                                  // Li
    [108.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                                 // Be
    [183.3, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                                 // B
    [277.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                                 // C
    [392.4, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                                 // N
    [524.9, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                                 // O
    [676.8, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                                 // F
    [848.6, 848.6, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                               // Ne
    [1040.98, 1040.98, 1071.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                        // Na
    [1253.60, 1253.60, 1302.2, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                        // Mg
    [1486.70, 1486.27, 1557.45, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                       // Al
    [1739.98, 1739.38, 1835.94, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                       // Si
    [2013.7, 2012.7, 2139.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                          // P
    [2307.84, 2306.64, 2464.04, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                       // S
    [2622.39, 2620.78, 2815.6, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                        // Cl
    [2957.70, 2955.63, 3190.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                        // Ar
    [3313.8, 3311.1, 3589.6, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],                          // K
    [3691.68, 3688.09, 4012.7, 341.3, 341.3, 344.9, 0.0, 0.0, 0.0],                  // Ca
    [4090.6, 4086.1, 4460.5, 395.4, 395.4, 399.6, 0.0, 0.0, 0.0],                    // Sc
    [4510.84, 4504.86, 4931.81, 452.2, 452.2, 458.4, 0.0, 0.0, 0.0],                 // Ti
    [4952.20, 4944.64, 5427.29, 511.3, 511.3, 519.2, 0.0, 0.0, 0.0],                 // V
    [5414.72, 5405.509, 5946.71, 572.8, 572.8, 582.8, 0.0, 0.0, 0.0],                // Cr
    [5898.75, 5887.65, 6490.45, 637.4, 637.4, 648.8, 0.0, 0.0, 0.0],                 // Mn
    [6403.84, 6390.84, 7057.98, 705.0, 705.0, 718.5, 0.0, 0.0, 0.0],                 // Fe
    [6930.32, 6915.30, 7649.43, 776.2, 776.2, 791.4, 0.0, 0.0, 0.0],                 // Co
    [7478.15, 7460.89, 8264.66, 851.5, 851.5, 868.8, 0.0, 0.0, 0.0],                 // Ni
    [8047.78, 8027.83, 8905.29, 929.7, 929.7, 949.8, 0.0, 0.0, 0.0],                 // Cu
    [8638.86, 8615.78, 9572.0, 1011.7, 1011.7, 1034.7, 0.0, 0.0, 0.0],               // Zn
    [9251.74, 9224.82, 10264.2, 1097.92, 1097.92, 1124.8, 0.0, 0.0, 0.0],            // Ga
    [9886.42, 9855.32, 10982.1, 1188.00, 1188.00, 1218.5, 0.0, 0.0, 0.0],            // Ge
    [10543.72, 10507.99, 11726.2, 1282.0, 1282.0, 1317.0, 0.0, 0.0, 0.0],            // As
    [11222.4, 11181.4, 12495.9, 1379.10, 1379.10, 1419.23, 0.0, 0.0, 0.0],           // Se
    [11924.2, 11877.6, 13291.4, 1480.43, 1480.43, 1525.90, 0.0, 0.0, 0.0],           // Br
    [12649.0, 12598.0, 14112.0, 1586.0, 1586.0, 1636.6, 0.0, 0.0, 0.0],              // Kr
    [13395.3, 13335.8, 14961.3, 1694.13, 1692.56, 1752.17, 0.0, 0.0, 0.0],           // Rb
    [14165.0, 14097.9, 15835.7, 1806.56, 1804.74, 1871.72, 0.0, 0.0, 0.0],           // Sr
    [14958.4, 14882.9, 16737.8, 1922.56, 1920.47, 1995.84, 0.0, 0.0, 0.0],           // Y
    [15775.1, 15690.9, 17667.8, 2042.36, 2039.9, 2124.4, 2219.4, 2302.7, 0.0],       // Zr
    [16615.1, 16521.0, 18622.5, 2165.89, 2163.0, 2257.4, 2367.0, 2461.8, 0.0],       // Nb
    [17479.34, 17374.3, 19608.3, 2293.16, 2289.85, 2394.81, 2518.3, 2623.5, 0.0],    // Mo
    [18367.1, 18250.8, 20619.0, 2424.0, 0.0, 2538.0, 2674.0, 2792.0, 0.0],           // Tc
    [19279.2, 19150.4, 21656.8, 2558.55, 2554.31, 2683.23, 2836.0, 2964.5, 0.0],     // Ru
    [20216.1, 20073.7, 22723.6, 2696.74, 2692.05, 2834.41, 3001.3, 3143.8, 0.0],     // Rh
    [21177.1, 21020.1, 23818.7, 2838.61, 2833.29, 2990.22, 3171.79, 3328.7, 0.0],    // Pd
    [22162.92, 21990.3, 24942.4, 2984.31, 2978.21, 3150.94, 3347.81, 3519.59, 0.0],  // Ag
    [23173.6, 22984.1, 26095.5, 3133.73, 3126.91, 3316.57, 3528.12, 3716.86, 0.0],   // Cd
    [24209.7, 24002.0, 27275.9, 3286.94, 3279.29, 3487.21, 3713.81, 3920.81, 0.0],   // In
    [25271.3, 25044.0, 28486.0, 3443.98, 3435.42, 3662.80, 3904.86, 4131.12, 0.0],   // Sn
    [26359.1, 26110.8, 29725.6, 3604.72, 3595.32, 3843.57, 4100.78, 4347.79, 0.0],   // Sb
    [27472.3, 27201.7, 30995.7, 3769.33, 3758.8, 4029.58, 4301.7, 4570.9, 0.0],      // Te
    [28612.0, 28317.2, 32294.7, 3937.65, 3926.04, 4220.72, 4507.5, 4800.9, 0.0],     // I
    [29779.0, 29458.0, 33624.0, 4109.9, 0.0, 0.0, 0.0, 0.0, 0.0],                    // Xe
    [30972.8, 30625.1, 34986.9, 4286.5, 4272.2, 4619.8, 4935.9, 5280.4, 0.0],        // Cs
    [32193.6, 31817.1, 36378.2, 4466.26, 4450.90, 4827.53, 5156.5, 5531.1, 0.0],     // Ba
    [33441.8, 33034.1, 37801.0, 4650.97, 4634.23, 5042.1, 5383.5, 5788.5, 833.0],    // La
    [34719.7, 34278.9, 39257.3, 4840.2, 4823.0, 5262.2, 5613.4, 6052.0, 883.0],      // Ce
    [36026.3, 35550.2, 40748.2, 5033.7, 5013.5, 5488.9, 5850.0, 6322.1, 929.0],      // Pr
    [37361.0, 36847.4, 42271.3, 5230.4, 5207.7, 5721.6, 6089.4, 6602.1, 978.0],      // Nd
    [38724.7, 38171.2, 43826.0, 5432.5, 5407.8, 5961.0, 6339.0, 6892.0, 0.0],        // Pm
    [40118.1, 39522.4, 45413.0, 5636.1, 5609.0, 6205.1, 6586.0, 7178.0, 1081.0],     // Sm
    [41542.2, 40901.9, 47037.9, 5845.7, 5816.6, 6456.4, 6843.2, 7480.3, 1131.0],     // Eu
    [42996.2, 42308.9, 48697.0, 6057.2, 6025.0, 6713.2, 7102.8, 7785.8, 1185.0],     // Gd
    [44481.6, 43744.1, 50382.0, 6272.8, 6238.0, 6978.0, 7366.7, 8102.0, 1240.0],     // Tb
    [45998.4, 45207.8, 52119.0, 6495.2, 6457.7, 7247.7, 7635.7, 8418.8, 1293.0],     // Dy
    [47546.7, 46699.7, 53877.0, 6719.8, 6679.5, 7525.3, 7911.0, 8747.0, 1348.0],     // Ho
    [49127.7, 48221.1, 55681.0, 6948.7, 6905.0, 7810.9, 8189.0, 9089.0, 1406.0],     // Er
    [50741.6, 49772.6, 57517.0, 7179.9, 7133.1, 8101.0, 8468.0, 9426.0, 1462.0],     // Tm
    [52388.9, 51354.0, 59370.0, 7415.6, 7367.3, 8401.8, 8758.8, 9780.1, 1521.4],     // Yb
    [54069.8, 52965.0, 61283.0, 7655.5, 7604.9, 8709.0, 9048.9, 10143.4, 1581.3],    // Lu
    [55790.2, 54611.4, 63234.0, 7899.0, 7844.6, 9022.7, 9347.3, 10515.8, 1644.6],    // Hf
    [57532.0, 56277.0, 65223.0, 8146.1, 8087.9, 9343.1, 9651.8, 10895.2, 1710.0],    // Ta
    [59318.24, 57981.7, 67244.3, 8397.6, 8335.2, 9672.35, 9961.5, 11285.9, 1775.4],  // W
    [61140.3, 59717.9, 69310.0, 8652.5, 8586.2, 10010.0, 10275.2, 11685.4, 1842.5],  // Re
    [63000.5, 61486.7, 71413.0, 8911.7, 8841.0, 10355.3, 10598.5, 12095.3, 1910.2],  // Os
    [64895.6, 63286.7, 73560.8, 9175.1, 9099.5, 10708.3, 10920.3, 12512.6, 1979.9],  // Ir
    [66832.0, 65112.0, 75748.0, 9442.3, 9361.8, 11070.7, 11250.5, 12942.0, 2050.5],  // Pt
    [68803.7, 66989.5, 77984.0, 9713.3, 9628.0, 11442.3, 11584.7, 13381.7, 2122.9],  // Au
    [70819.0, 68895.0, 80253.0, 9988.8, 9897.6, 11822.6, 11924.1, 13830.1, 2195.3],  // Hg
    [72871.5, 70831.9, 82576.0, 10268.5, 10172.8, 12213.3, 12271.5, 14291.5, 2270.6], // Tl
    [74969.4, 72804.2, 84936.0, 10551.5, 10449.5, 12613.7, 12622.6, 14764.4, 2345.5], // Pb
    [77107.9, 74814.8, 87343.0, 10838.8, 10730.91, 13023.5, 12979.9, 15247.7, 2422.6], // Bi
    [79290.0, 76862.0, 89800.0, 11130.8, 11015.8, 13447.0, 13340.4, 15744.0, 0.0],   // Po
    [81520.0, 78950.0, 92300.0, 11426.8, 11304.8, 13876.0, 0.0, 16251.0, 0.0],       // At
    [83780.0, 81070.0, 94870.0, 11727.0, 11597.9, 14316.0, 0.0, 16770.0, 0.0],       // Rn
    [86100.0, 83230.0, 97470.0, 12031.3, 11895.0, 14770.0, 14450.0, 17303.0, 0.0],   // Fr
    [88470.0, 85430.0, 100130.0, 12339.7, 12196.2, 15235.8, 14841.4, 17849.0, 0.0],  // Ra
    [90884.0, 87670.0, 102850.0, 12652.0, 12500.8, 15713.0, 0.0, 18408.0, 0.0],      // Ac
    [93350.0, 89953.0, 105609.0, 12968.7, 12809.6, 16202.2, 15623.7, 18982.5, 2996.1], // Th
    [95868.0, 92287.0, 108427.0, 13290.7, 13122.2, 16702.0, 16024.0, 19568.0, 3082.3], // Pa
    [98439.0, 94665.0, 111300.0, 13614.7, 13438.8, 17220.0, 16428.3, 20167.1, 3170.8], // U
    [0.0, 0.0, 0.0, 13944.1, 13759.7, 17750.2, 16840.0, 20784.8, 0.0],               // Np
    [0.0, 0.0, 0.0, 14278.6, 14084.2, 18293.7, 17255.3, 21417.3, 0.0],               // Pu
    [0.0, 0.0, 0.0, 14617.2, 14411.9, 18852.0, 17676.5, 22065.2, 0.0],               // Am
];

/// Line energies of one element in keV. `None` marks a line the element
/// does not emit or that is not tabulated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmissionLines {
    pub atomic_number: u32,
    pub ka1_energy: Option<f64>,
    pub ka2_energy: Option<f64>,
    pub kb1_energy: Option<f64>,
    pub la1_energy: Option<f64>,
    pub la2_energy: Option<f64>,
    pub lb1_energy: Option<f64>,
    pub lb2_energy: Option<f64>,
    pub lg1_energy: Option<f64>,
    pub ma1_energy: Option<f64>,
}

impl EmissionLines {
    fn from_row(atomic_number: u32, row: &[f64; 9]) -> Self {
        let kev = |ev: f64| (ev > 0.0).then_some(ev / 1000.0);
        Self {
            atomic_number,
            ka1_energy: kev(row[0]),
            ka2_energy: kev(row[1]),
            kb1_energy: kev(row[2]),
            la1_energy: kev(row[3]),
            la2_energy: kev(row[4]),
            lb1_energy: kev(row[5]),
            lb2_energy: kev(row[6]),
            lg1_energy: kev(row[7]),
            ma1_energy: kev(row[8]),
        }
    }

    /// `(label, energy)` for every available line, lowest energy first.
    pub fn available(&self) -> Vec<(&'static str, f64)> {
        let mut lines: Vec<(&'static str, f64)> = [
            ("Ka1", self.ka1_energy),
            ("Ka2", self.ka2_energy),
            ("Kb1", self.kb1_energy),
            ("La1", self.la1_energy),
            ("La2", self.la2_energy),
            ("Lb1", self.lb1_energy),
            ("Lb2", self.lb2_energy),
            ("Lg1", self.lg1_energy),
            ("Ma1", self.ma1_energy),
        ]
        .into_iter()
        .filter_map(|(label, energy)| energy.map(|e| (label, e)))
        .collect();
        lines.sort_by(|a, b| a.1.total_cmp(&b.1));
        lines
    }
}

/// Emission lines of element `atomic_number`.
///
/// Elements outside the table (hydrogen, helium, the transuranics past
/// americium) report every line as `None`; numbers outside `1..=118` fail
/// with `out_of_range`.
pub fn emission_lines(atomic_number: u32) -> Result<EmissionLines> {
    if !(1..=MAX_ATOMIC_NUMBER).contains(&atomic_number) {
        return Err(EngineError::OutOfRange(format!(
            "atomic number {atomic_number} outside 1..={MAX_ATOMIC_NUMBER}"
        )));
    }
    let row = atomic_number
        .checked_sub(FIRST_TABULATED)
        .and_then(|i| LINE_TABLE.get(i as usize))
        .unwrap_or(&[0.0; 9]);
    Ok(EmissionLines::from_row(atomic_number, row))
}
