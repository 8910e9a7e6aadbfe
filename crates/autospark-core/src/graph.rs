//! Effect-graph description and the fixed mix topology built from tempo timing

use serde::{Deserialize, Serialize};

use crate::config::MixConfig;
use crate::timing::TimingProfile;

/// Freeverb-style reverb settings (all 0..=1, `freeze` is a switch)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverbParams {
    pub room_size: f32,
    pub damping: f32,
    pub wet_level: f32,
    pub dry_level: f32,
    pub width: f32,
    pub freeze: bool,
}

impl ReverbParams {
    /// Fully wet, full width, not frozen
    pub const fn wet(room_size: f32, damping: f32) -> Self {
        Self {
            room_size,
            damping,
            wet_level: 1.0,
            dry_level: 0.0,
            width: 1.0,
            freeze: false,
        }
    }
}

/// One node in an effect graph.
///
/// `Series` feeds each child's output into the next. `Mix` runs a copy of
/// its input through every branch and sums the results sample by sample
/// with no gain compensation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectNode {
    Gain { db: f32 },
    HighPass { freq_hz: f32 },
    LowPass { freq_hz: f32, gain_db: f32, q: f32 },
    LowShelf { freq_hz: f32, gain_db: f32, q: f32 },
    HighShelf { freq_hz: f32, gain_db: f32, q: f32 },
    Peak { freq_hz: f32, gain_db: f32, q: f32 },
    Delay { seconds: f32, feedback: f32, mix: f32 },
    Reverb(ReverbParams),
    Compressor { threshold_db: f32, ratio: f32, attack_ms: f32, release_ms: f32 },
    Limiter { threshold_db: f32, release_ms: f32 },
    /// Phase flip
    Invert,
    Series(Vec<EffectNode>),
    Mix(Vec<EffectNode>),
}

impl EffectNode {
    pub fn gain(db: f32) -> Self {
        Self::Gain { db }
    }

    pub fn high_pass(freq_hz: f32) -> Self {
        Self::HighPass { freq_hz }
    }

    pub fn high_shelf(freq_hz: f32, gain_db: f32, q: f32) -> Self {
        Self::HighShelf { freq_hz, gain_db, q }
    }

    pub fn peak(freq_hz: f32, gain_db: f32, q: f32) -> Self {
        Self::Peak { freq_hz, gain_db, q }
    }

    pub fn delay(seconds: f32, feedback: f32, mix: f32) -> Self {
        Self::Delay { seconds, feedback, mix }
    }

    pub fn compressor(threshold_db: f32, ratio: f32, attack_ms: f32, release_ms: f32) -> Self {
        Self::Compressor { threshold_db, ratio, attack_ms, release_ms }
    }

    pub fn limiter(threshold_db: f32, release_ms: f32) -> Self {
        Self::Limiter { threshold_db, release_ms }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gain { .. } => "Gain",
            Self::HighPass { .. } => "High Pass",
            Self::LowPass { .. } => "Low Pass",
            Self::LowShelf { .. } => "Low Shelf",
            Self::HighShelf { .. } => "High Shelf",
            Self::Peak { .. } => "Peak",
            Self::Delay { .. } => "Delay",
            Self::Reverb(_) => "Reverb",
            Self::Compressor { .. } => "Compressor",
            Self::Limiter { .. } => "Limiter",
            Self::Invert => "Invert",
            Self::Series(_) => "Series",
            Self::Mix(_) => "Mix",
        }
    }

    pub fn children(&self) -> &[EffectNode] {
        match self {
            Self::Series(children) | Self::Mix(children) => children,
            _ => &[],
        }
    }

    /// Depth-first, pre-order walk over this node and its descendants
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a EffectNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Number of leaf processors in the graph
    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |node| {
            if !matches!(node, Self::Series(_) | Self::Mix(_)) {
                count += 1;
            }
        });
        count
    }
}

/// The four chains of one mixdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixGraph {
    pub vocal: EffectNode,
    pub reverb_send: EffectNode,
    pub instrument: EffectNode,
    pub master: EffectNode,
}

/// Builds the fixed mix topology, parameterised by tempo-derived timing
#[derive(Debug, Clone, Copy, Default)]
pub struct MixGraphBuilder {
    config: MixConfig,
}

impl MixGraphBuilder {
    pub fn new(config: MixConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    /// Wire a timing profile onto the four chains.
    ///
    /// Pre-delays map as room ER → short, plate → medium, hall → long and
    /// room LR → slap delay. The master compressor takes the limiter-band
    /// release and the limiter takes the slow-band release.
    pub fn build(&self, timing: &TimingProfile) -> MixGraph {
        let pd = &timing.pre_delay;
        let rel = &timing.release;
        MixGraph {
            vocal: self.vocal_chain(rel.fast as f32, rel.medium as f32),
            reverb_send: self.reverb_send_chain(
                pd.room_er as f32,
                pd.plate as f32,
                pd.hall as f32,
                pd.room_lr as f32,
                self.config.reverb_gain_db,
            ),
            instrument: self.instrument_chain(self.config.headroom_db),
            master: self.master_chain(rel.limiter as f32, rel.slow as f32),
        }
    }

    /// Vocal cleanup EQ, inverted-copy duck, then bus compression.
    ///
    /// The `Mix` sums the dry vocal with a phase-inverted, heavily
    /// compressed copy 40 dB down, which subtracts the compressor's
    /// gain-reduction envelope from the dry signal.
    pub fn vocal_chain(&self, release_duck_ms: f32, release_main_ms: f32) -> EffectNode {
        EffectNode::Series(vec![
            EffectNode::gain(self.config.vocal_input_db),
            EffectNode::high_pass(230.0),
            EffectNode::peak(2700.0, -2.0, 1.0),
            EffectNode::high_shelf(20000.0, -2.0, 1.8),
            EffectNode::gain(1.0),
            EffectNode::peak(1400.0, 3.0, 1.15),
            EffectNode::peak(8500.0, 2.5, 1.0),
            EffectNode::gain(-1.0),
            EffectNode::Mix(vec![
                EffectNode::gain(0.0),
                EffectNode::Series(vec![
                    EffectNode::Invert,
                    EffectNode::compressor(-30.0, 3.2, 40.0, release_duck_ms),
                    EffectNode::gain(-40.0),
                ]),
            ]),
            EffectNode::compressor(-18.0, 2.5, 19.0, release_main_ms),
            EffectNode::gain(0.0),
        ])
    }

    /// Four parallel spaces (short room, plate, hall, slap delay) with
    /// tempo-quantised pre-delays, followed by a tone-shaping EQ.
    pub fn reverb_send_chain(
        &self,
        pre_delay_short_ms: f32,
        pre_delay_medium_ms: f32,
        pre_delay_long_ms: f32,
        pre_delay_duck_ms: f32,
        output_gain_db: f32,
    ) -> EffectNode {
        let delay = EffectNode::Series(vec![
            EffectNode::gain(-20.0),
            EffectNode::delay(pre_delay_duck_ms / 8.0 / 1000.0, 0.0, 1.0),
            EffectNode::gain(-12.0),
        ]);

        let short = EffectNode::Series(vec![
            EffectNode::gain(-20.0),
            EffectNode::delay(pre_delay_short_ms / 1000.0, 0.0, 1.0),
            EffectNode::Reverb(ReverbParams::wet(0.2, 0.35)),
            EffectNode::gain(-12.0),
        ]);

        let medium = EffectNode::Series(vec![
            EffectNode::gain(-16.0),
            EffectNode::delay(pre_delay_medium_ms / 1000.0, 0.3, 1.0),
            EffectNode::Reverb(ReverbParams::wet(0.45, 0.55)),
            EffectNode::gain(-19.0),
        ]);

        let long = EffectNode::Series(vec![
            EffectNode::gain(-12.0),
            EffectNode::delay(pre_delay_long_ms / 1000.0, 0.6, 1.0),
            EffectNode::Reverb(ReverbParams::wet(0.6, 0.7)),
            EffectNode::gain(-23.0),
        ]);

        EffectNode::Series(vec![
            EffectNode::Mix(vec![short, medium, long, delay]),
            EffectNode::peak(1450.0, -4.0, 1.83),
            EffectNode::peak(2300.0, 5.0, 0.51),
            EffectNode::gain(output_gain_db),
        ])
    }

    pub fn instrument_chain(&self, headroom_db: f32) -> EffectNode {
        EffectNode::Series(vec![EffectNode::gain(headroom_db)])
    }

    pub fn master_chain(&self, compressor_release_ms: f32, limiter_release_ms: f32) -> EffectNode {
        EffectNode::Series(vec![
            EffectNode::compressor(-10.0, 1.6, 10.0, compressor_release_ms),
            EffectNode::limiter(-3.0, limiter_release_ms),
            EffectNode::gain(-0.5),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> MixGraphBuilder {
        MixGraphBuilder::new(MixConfig::default())
    }

    #[test]
    fn test_master_chain_release_cross_wiring() {
        let timing = TimingProfile::from_bpm(120.0).unwrap();
        let graph = builder().build(&timing);

        let EffectNode::Series(stages) = &graph.master else {
            panic!("master chain should be a series");
        };
        assert_eq!(stages.len(), 3);
        match (&stages[0], &stages[1]) {
            (
                EffectNode::Compressor { release_ms: comp_rel, .. },
                EffectNode::Limiter { release_ms: lim_rel, .. },
            ) => {
                assert_eq!(*comp_rel, timing.release.limiter as f32);
                assert_eq!(*lim_rel, timing.release.slow as f32);
            }
            other => panic!("unexpected master stages: {other:?}"),
        }
    }

    #[test]
    fn test_master_chain_cross_wiring_with_distinct_values() {
        let master = builder().master_chain(777.0, 333.0);
        assert_eq!(
            master,
            EffectNode::Series(vec![
                EffectNode::compressor(-10.0, 1.6, 10.0, 777.0),
                EffectNode::limiter(-3.0, 333.0),
                EffectNode::gain(-0.5),
            ])
        );
    }

    #[test]
    fn test_vocal_chain_release_roles() {
        let timing = TimingProfile::from_bpm(120.0).unwrap();
        let graph = builder().build(&timing);

        let mut releases = Vec::new();
        graph.vocal.walk(&mut |node| {
            if let EffectNode::Compressor { threshold_db, release_ms, .. } = node {
                releases.push((*threshold_db, *release_ms));
            }
        });
        // duck compressor sits inside the Mix, ahead of the bus compressor
        assert_eq!(
            releases,
            vec![
                (-30.0, timing.release.fast as f32),
                (-18.0, timing.release.medium as f32),
            ]
        );
    }

    #[test]
    fn test_vocal_chain_topology() {
        let vocal = builder().vocal_chain(100.0, 300.0);
        let stages = vocal.children();
        assert_eq!(stages.len(), 11);
        assert_eq!(stages[0], EffectNode::gain(-4.0));
        assert_eq!(stages[1], EffectNode::high_pass(230.0));

        let EffectNode::Mix(branches) = &stages[8] else {
            panic!("stage 8 should be the duck mix");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0], EffectNode::gain(0.0));
        let duck = branches[1].children();
        assert_eq!(duck[0], EffectNode::Invert);
        assert_eq!(duck[2], EffectNode::gain(-40.0));
    }

    #[test]
    fn test_reverb_send_pre_delay_permutation() {
        let timing = TimingProfile::from_bpm(120.0).unwrap();
        let graph = builder().build(&timing);
        let pd = timing.pre_delay;

        let EffectNode::Mix(branches) = &graph.reverb_send.children()[0] else {
            panic!("reverb send should open with a mix");
        };
        assert_eq!(branches.len(), 4);

        let delay_of = |branch: &EffectNode| match branch.children()[1] {
            EffectNode::Delay { seconds, .. } => seconds,
            ref other => panic!("expected delay, got {other:?}"),
        };
        assert_eq!(delay_of(&branches[0]), pd.room_er as f32 / 1000.0);
        assert_eq!(delay_of(&branches[1]), pd.plate as f32 / 1000.0);
        assert_eq!(delay_of(&branches[2]), pd.hall as f32 / 1000.0);
        assert_eq!(delay_of(&branches[3]), pd.room_lr as f32 / 8.0 / 1000.0);
    }

    #[test]
    fn test_reverb_branch_feedback_and_spaces() {
        let send = builder().reverb_send_chain(5.0, 25.0, 50.0, 200.0, 0.0);
        let branches = send.children()[0].children();

        let feedbacks: Vec<f32> = branches
            .iter()
            .map(|b| match b.children()[1] {
                EffectNode::Delay { feedback, .. } => feedback,
                _ => f32::NAN,
            })
            .collect();
        assert_eq!(feedbacks, vec![0.0, 0.3, 0.6, 0.0]);

        assert_eq!(branches[0].children()[2], EffectNode::Reverb(ReverbParams::wet(0.2, 0.35)));
        assert_eq!(branches[1].children()[2], EffectNode::Reverb(ReverbParams::wet(0.45, 0.55)));
        assert_eq!(branches[2].children()[2], EffectNode::Reverb(ReverbParams::wet(0.6, 0.7)));
        assert_eq!(branches[3].leaf_count(), 3);
    }

    #[test]
    fn test_config_gains_flow_into_chains() {
        let config = MixConfig {
            headroom_db: -6.0,
            vocal_input_db: -2.0,
            reverb_gain_db: 1.5,
            ..Default::default()
        };
        let timing = TimingProfile::from_bpm(90.0).unwrap();
        let graph = MixGraphBuilder::new(config).build(&timing);

        assert_eq!(graph.instrument, EffectNode::Series(vec![EffectNode::gain(-6.0)]));
        assert_eq!(graph.vocal.children()[0], EffectNode::gain(-2.0));
        assert_eq!(graph.reverb_send.children().last(), Some(&EffectNode::gain(1.5)));
    }

    #[test]
    fn test_leaf_count() {
        let graph = builder().build(&TimingProfile::from_bpm(120.0).unwrap());
        assert_eq!(graph.vocal.leaf_count(), 14);
        assert_eq!(graph.reverb_send.leaf_count(), 3 + 4 + 4 + 4 + 3);
        assert_eq!(graph.instrument.leaf_count(), 1);
        assert_eq!(graph.master.leaf_count(), 3);
    }
}
