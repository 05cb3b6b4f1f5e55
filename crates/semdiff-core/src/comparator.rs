//! The differential function comparator: a lockstep control-flow walk over
//! two functions with instruction-kind-specific equivalence heuristics.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use tracing::{debug, trace, trace_span};

use semdiff_ir::{
    BlockId, Callee, CastOp, Constant, FuncId, Function, InstId, InstKind, Instruction, Module,
    Operand, Terminator, Type, UseSite,
};

use crate::config::Config;
use crate::heuristics::{
    fold_constant, gep_byte_offset, is_alloc_fn, is_mem_fn, struct_field_alignment,
    COUNTED_ALLOC_FNS,
};
use crate::providers::Collaborators;
use crate::reloc::{is_discardable, may_conflict, RelocState, RelocWindow};
use crate::report::{
    ComparisonResult, Coverage, Decision, Diagnostic, DivergencePoint, DivergenceRecord, Verdict,
};
use crate::sync::{RValue, Side, SyncStore, ValueRef};

/// Compares one function pair. All mutable state is owned by the instance
/// and created fresh per comparison; the public contract is a single call
/// to [`FunctionComparator::compare`].
pub struct FunctionComparator<'a> {
    pub(crate) mod_l: &'a Module,
    pub(crate) mod_r: &'a Module,
    pub(crate) func_l: FuncId,
    pub(crate) func_r: FuncId,
    pub(crate) config: &'a Config,
    pub(crate) collab: Collaborators<'a>,
    pub(crate) sync: SyncStore,
    pub(crate) block_map_l: FxHashMap<BlockId, BlockId>,
    pub(crate) block_map_r: FxHashMap<BlockId, BlockId>,
    pub(crate) phi_queue: Vec<(InstId, InstId)>,
    pub(crate) reloc: RelocState,
    pub(crate) divergence: Option<DivergenceRecord>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) coverage: Coverage,
}

impl<'a> FunctionComparator<'a> {
    /// Create a comparator for one function pair.
    pub fn new(
        mod_l: &'a Module,
        mod_r: &'a Module,
        func_l: FuncId,
        func_r: FuncId,
        config: &'a Config,
        collab: Collaborators<'a>,
    ) -> Self {
        Self {
            mod_l,
            mod_r,
            func_l,
            func_r,
            config,
            collab,
            sync: SyncStore::new(),
            block_map_l: FxHashMap::default(),
            block_map_r: FxHashMap::default(),
            phi_queue: Vec::new(),
            reloc: RelocState::default(),
            divergence: None,
            diagnostics: Vec::new(),
            coverage: Coverage::default(),
        }
    }

    fn module_of(&self, side: Side) -> &'a Module {
        match side {
            Side::L => self.mod_l,
            Side::R => self.mod_r,
        }
    }

    fn top_func_id(&self, side: Side) -> FuncId {
        match side {
            Side::L => self.func_l,
            Side::R => self.func_r,
        }
    }

    /// Run the comparison to a definite verdict.
    pub fn compare(mut self) -> ComparisonResult {
        let fl = self.mod_l.function(self.func_l);
        let fr = self.mod_r.function(self.func_r);
        let span = trace_span!("compare", left = %fl.name, right = %fr.name);
        let _enter = span.enter();

        if !self.cmp_signature(fl, fr) {
            debug!(left = %fl.name, right = %fr.name, "signature mismatch");
            self.divergence = Some(DivergenceRecord {
                point: DivergencePoint::Signature,
                left_loc: None,
                right_loc: None,
            });
            return self.finish(Verdict::NotEqual);
        }

        let (entry_l, entry_r) = match (fl.entry(), fr.entry()) {
            (None, None) => return self.finish(Verdict::Equal),
            (Some(el), Some(er)) => (el, er),
            _ => {
                self.divergence = Some(DivergenceRecord {
                    point: DivergencePoint::Signature,
                    left_loc: None,
                    right_loc: None,
                });
                return self.finish(Verdict::NotEqual);
            }
        };

        let mut work = VecDeque::new();
        work.push_back((entry_l, entry_r));
        while let Some((bl, br)) = work.pop_front() {
            match (self.block_map_l.get(&bl), self.block_map_r.get(&br)) {
                (Some(mapped), _) if *mapped != br => {
                    self.record_terminator_divergence(bl, br);
                    return self.finish(Verdict::NotEqual);
                }
                (_, Some(mapped)) if *mapped != bl => {
                    self.record_terminator_divergence(bl, br);
                    return self.finish(Verdict::NotEqual);
                }
                (Some(_), Some(_)) => continue,
                _ => {
                    self.block_map_l.insert(bl, br);
                    self.block_map_r.insert(br, bl);
                }
            }
            match self.walk_block(bl, br) {
                Ok(successors) => work.extend(successors),
                Err(()) => return self.finish(Verdict::NotEqual),
            }
        }

        // PHIs are deferred until every block pair is synchronized, since
        // operand correspondence depends on the predecessor mapping.
        let queue = std::mem::take(&mut self.phi_queue);
        for (lid, rid) in queue {
            if !self
                .cmp_phis(self.func_l, lid, self.func_r, rid)
                .is_equal()
            {
                self.record_inst_divergence(Some(lid), Some(rid));
                return self.finish(Verdict::NotEqual);
            }
        }
        self.finish(Verdict::Equal)
    }

    fn finish(self, verdict: Verdict) -> ComparisonResult {
        let divergence = match verdict {
            Verdict::Equal => None,
            Verdict::NotEqual => self.divergence,
        };
        ComparisonResult {
            verdict,
            divergence,
            diagnostics: self.diagnostics,
            coverage: self.coverage,
        }
    }

    fn cmp_signature(&mut self, fl: &Function, fr: &Function) -> bool {
        if fl.params.len() != fr.params.len() {
            return false;
        }
        if !self.cmp_types(&fl.ret, &fr.ret).is_equal() {
            return false;
        }
        for (tl, tr) in fl.params.iter().zip(&fr.params) {
            if !self.cmp_types(tl, tr).is_equal() {
                return false;
            }
        }
        // Arguments are synchronized pairwise up front.
        for i in 0..fl.params.len() {
            let index = u32::try_from(i).unwrap_or(u32::MAX);
            self.sync.map_values(
                ValueRef::Arg {
                    func: self.func_l,
                    index,
                },
                ValueRef::Arg {
                    func: self.func_r,
                    index,
                },
            );
        }
        true
    }

    // ----- block-pair walk ------------------------------------------------

    fn walk_block(&mut self, bl: BlockId, br: BlockId) -> Result<Vec<(BlockId, BlockId)>, ()> {
        let ml = self.mod_l;
        let mr = self.mod_r;
        let fl = ml.function(self.func_l);
        let fr = mr.function(self.func_r);
        let span = trace_span!(
            "block_pair",
            left = %fl.block(bl).name,
            right = %fr.block(br).name,
        );
        let _enter = span.enter();

        let insts_l = &fl.block(bl).insts;
        let insts_r = &fr.block(br).insts;
        let mut il = 0usize;
        let mut ir = 0usize;
        self.reloc.clear();

        loop {
            self.consume_reloc_span(bl, br, &mut il, &mut ir);
            let end_l = il >= insts_l.len();
            let end_r = ir >= insts_r.len();

            if end_l && end_r {
                if !self.discard_reloc_leftover() {
                    return Err(());
                }
                return self.cmp_terminators(bl, br);
            }

            if end_l != end_r {
                // One side has trailing instructions.
                let side = if end_l { Side::R } else { Side::L };
                let (func_id, block, pos) = if end_l {
                    (self.func_r, br, &mut ir)
                } else {
                    (self.func_l, bl, &mut il)
                };
                let at = *pos;
                if self.may_skip(side, func_id, block, at) {
                    *pos += 1;
                    continue;
                }
                let func = self.module_of(side).function(func_id);
                let id = func.block(block).insts[at];
                if is_discardable(func.inst(id)) {
                    trace!(side = ?side, inst = ?id, "ignoring trailing instruction");
                    self.sync.mark_ignored(side, ValueRef::inst(func_id, id));
                    if end_l {
                        ir += 1;
                    } else {
                        il += 1;
                    }
                    continue;
                }
                let (left, right) = if end_l {
                    (None, Some(id))
                } else {
                    (Some(id), None)
                };
                self.record_inst_divergence(left, right);
                return Err(());
            }

            let lid = insts_l[il];
            let rid = insts_r[ir];
            let li = fl.inst(lid);
            let ri = fr.inst(rid);

            if li.is_phi() && ri.is_phi() {
                self.phi_queue.push((lid, rid));
                il += 1;
                ir += 1;
                continue;
            }

            let lref = ValueRef::inst(self.func_l, lid);
            let rref = ValueRef::inst(self.func_r, rid);
            if self.sync.already_equal(&lref, &rref) {
                il += 1;
                ir += 1;
                continue;
            }

            let snap = self.sync.snapshot();
            if self
                .cmp_insts(self.func_l, lid, self.func_r, rid)
                .is_equal()
            {
                // A pair matched while a span is pending reorders the
                // window side's instruction past the span; that move must
                // pass the same aliasing-hazard check as the original
                // relocation.
                if let Some(side) = self.reloc.window().map(|w| w.side) {
                    let matched = match side {
                        Side::L => lid,
                        Side::R => rid,
                    };
                    if self.conflicts_with_reloc_span(matched) {
                        debug!(
                            left = ?lid,
                            right = ?rid,
                            "relocation abandoned: matched instruction conflicts with pending span"
                        );
                        self.sync.restore(snap);
                        self.record_inst_divergence(Some(lid), Some(rid));
                        return Err(());
                    }
                }
                il += 1;
                ir += 1;
                continue;
            }
            // Undo everything the failed pair comparison mapped.
            self.sync.restore(snap);
            trace!(left = ?lid, right = ?rid, "instruction pair mismatch");

            if self.may_skip(Side::L, self.func_l, bl, il) {
                il += 1;
                continue;
            }
            if self.may_skip(Side::R, self.func_r, br, ir) {
                ir += 1;
                continue;
            }

            if !self.config.suppress_relocations
                && !self.reloc.is_active()
                && self.try_relocation(bl, br, &mut il, &mut ir)
            {
                continue;
            }

            if !self.config.suppress_oracle
                && self
                    .collab
                    .oracle
                    .blocks_equivalent(fl, bl, il, fr, br, ir)
            {
                debug!("oracle decided block remainders equivalent");
                il = insts_l.len();
                ir = insts_r.len();
                continue;
            }

            if (li.is_call() || ri.is_call())
                && self.process_call_difference(bl, br, &mut il, &mut ir)
            {
                continue;
            }

            if self.try_explain(bl, br, &mut il, &mut ir) {
                continue;
            }

            self.record_inst_divergence(Some(lid), Some(rid));
            return Err(());
        }
    }

    // ----- relocation -----------------------------------------------------

    /// While a window is active, match the other side's current instruction
    /// against the front of the stored span.
    fn consume_reloc_span(&mut self, bl: BlockId, br: BlockId, il: &mut usize, ir: &mut usize) {
        loop {
            let Some(window) = self.reloc.window().cloned() else {
                return;
            };
            if window.begin >= window.end {
                self.reloc.clear();
                return;
            }
            let span_func_id = self.top_func_id(window.side);
            let span_func = self.module_of(window.side).function(span_func_id);
            let span_inst = span_func.block(window.block).insts[window.begin];

            let other = window.side.other();
            let other_func_id = self.top_func_id(other);
            let other_func = self.module_of(other).function(other_func_id);
            let (other_block, other_pos) = match other {
                Side::L => (bl, *il),
                Side::R => (br, *ir),
            };
            if other_pos >= other_func.block(other_block).insts.len() {
                return;
            }
            let other_inst = other_func.block(other_block).insts[other_pos];

            let snap = self.sync.snapshot();
            let decision = match window.side {
                Side::R => self.cmp_insts(other_func_id, other_inst, span_func_id, span_inst),
                Side::L => self.cmp_insts(span_func_id, span_inst, other_func_id, other_inst),
            };
            if decision.is_equal() {
                trace!(span_inst = ?span_inst, "matched instruction from relocated span");
                match other {
                    Side::L => *il += 1,
                    Side::R => *ir += 1,
                }
                let mut advanced = window;
                advanced.begin += 1;
                self.reloc = if advanced.begin >= advanced.end {
                    RelocState::None
                } else {
                    RelocState::Matching(advanced)
                };
            } else {
                self.sync.restore(snap);
                return;
            }
        }
    }

    /// On divergence, search forward within the current block of one side
    /// for an instruction matching the other side's cursor.
    fn try_relocation(&mut self, bl: BlockId, br: BlockId, il: &mut usize, ir: &mut usize) -> bool {
        for side in [Side::R, Side::L] {
            let s_func_id = self.top_func_id(side);
            let s_func = self.module_of(side).function(s_func_id);
            let (s_block, s_pos) = match side {
                Side::L => (bl, *il),
                Side::R => (br, *ir),
            };
            let other = side.other();
            let o_func_id = self.top_func_id(other);
            let o_func = self.module_of(other).function(o_func_id);
            let (o_block, o_pos) = match other {
                Side::L => (bl, *il),
                Side::R => (br, *ir),
            };
            let o_inst = o_func.block(o_block).insts[o_pos];

            let s_insts = &s_func.block(s_block).insts;
            let bound = self.config.reloc_lookahead.unwrap_or(usize::MAX);
            for k in (s_pos + 1)..s_insts.len() {
                if k - s_pos - 1 >= bound {
                    break;
                }
                let candidate = s_insts[k];
                let snap = self.sync.snapshot();
                let decision = match side {
                    Side::R => self.cmp_insts(o_func_id, o_inst, s_func_id, candidate),
                    Side::L => self.cmp_insts(s_func_id, candidate, o_func_id, o_inst),
                };
                if !decision.is_equal() {
                    self.sync.restore(snap);
                    continue;
                }
                // Aliasing-hazard check over the skipped span.
                let s_module = self.module_of(side);
                let moved = s_func.inst(candidate);
                for j in s_pos..k {
                    let skipped = s_func.inst(s_insts[j]);
                    if may_conflict(
                        s_module,
                        s_func,
                        skipped,
                        moved,
                        self.config.hazard_granularity,
                    ) {
                        debug!(candidate = ?candidate, "relocation rejected: aliasing hazard");
                        self.sync.restore(snap);
                        return false;
                    }
                }
                debug!(side = ?side, begin = s_pos, end = k, "relocation window stored");
                self.reloc = RelocState::Stored(RelocWindow {
                    side,
                    block: s_block,
                    begin: s_pos,
                    end: k,
                });
                match side {
                    Side::L => {
                        *il = k + 1;
                        *ir += 1;
                    }
                    Side::R => {
                        *ir = k + 1;
                        *il += 1;
                    }
                }
                return true;
            }
        }
        false
    }

    /// Check an instruction matched on the window's side against every
    /// still-unmatched span instruction. The span runs earlier in program
    /// order, so matching past it hoists the instruction above the span.
    fn conflicts_with_reloc_span(&self, matched: InstId) -> bool {
        let Some(window) = self.reloc.window() else {
            return false;
        };
        let module = self.module_of(window.side);
        let func = module.function(self.top_func_id(window.side));
        let moved = func.inst(matched);
        (window.begin..window.end).any(|pos| {
            let span_inst = func.inst(func.block(window.block).insts[pos]);
            may_conflict(
                module,
                func,
                span_inst,
                moved,
                self.config.hazard_granularity,
            )
        })
    }

    /// At block end, an unmatched span is tolerable only when it is dead
    /// code with no observable external effect.
    fn discard_reloc_leftover(&mut self) -> bool {
        let Some(window) = self.reloc.window().cloned() else {
            return true;
        };
        let func_id = self.top_func_id(window.side);
        let func = self.module_of(window.side).function(func_id);
        for pos in window.begin..window.end {
            let id = func.block(window.block).insts[pos];
            if !is_discardable(func.inst(id)) {
                let (left, right) = match window.side {
                    Side::L => (Some(id), None),
                    Side::R => (None, Some(id)),
                };
                self.record_inst_divergence(left, right);
                return false;
            }
            self.sync.mark_ignored(window.side, ValueRef::inst(func_id, id));
        }
        self.reloc.clear();
        true
    }

    // ----- instruction pair comparison ------------------------------------

    /// Compare two instructions along with their operands; synchronizes the
    /// pair on success.
    fn cmp_insts(&mut self, lf: FuncId, lid: InstId, rf: FuncId, rid: InstId) -> Decision {
        let fl = self.mod_l.function(lf);
        let fr = self.mod_r.function(rf);
        self.coverage.compared_left += 1;
        self.coverage.compared_right += 1;
        if let Some(loc) = self.collab.debug_info.location_of(fl, lid) {
            self.coverage.lines_left.insert((loc.file, loc.line));
        }
        if let Some(loc) = self.collab.debug_info.location_of(fr, rid) {
            self.coverage.lines_right.insert((loc.file, loc.line));
        }

        let decision = self.cmp_kind(lf, lid, rf, rid);
        if decision.is_equal() {
            let lref = ValueRef::inst(lf, lid);
            let rref = ValueRef::inst(rf, rid);
            if self.sync.map_values(lref.clone(), rref.clone()) != Decision::Equal {
                return Decision::NotEqual;
            }
            self.sync.note_equal(lref, rref);
            self.coverage.matched += 1;
        }
        decision
    }

    /// Strategy dispatch keyed by instruction kind and comparison mode.
    fn cmp_kind(&mut self, lf: FuncId, lid: InstId, rf: FuncId, rid: InstId) -> Decision {
        let li = self.mod_l.function(lf).inst(lid);
        let ri = self.mod_r.function(rf).inst(rid);
        match (&li.kind, &ri.kind) {
            (InstKind::Gep { .. }, InstKind::Gep { .. }) => self.cmp_geps(lf, lid, rf, rid),
            (InstKind::Call { .. }, InstKind::Call { .. }) => self.cmp_calls(lf, lid, rf, rid),
            (InstKind::Cmp { .. }, InstKind::Cmp { .. }) => self.cmp_cmps(lf, lid, rf, rid),
            (InstKind::Binary { .. }, InstKind::Binary { .. }) => {
                self.cmp_binaries(lf, lid, rf, rid)
            }
            (InstKind::Phi { .. }, InstKind::Phi { .. }) => self.cmp_phis(lf, lid, rf, rid),
            _ => self.cmp_generic(lf, li, rf, ri),
        }
    }

    /// Structural comparison for kinds without a dedicated strategy:
    /// matching shape, matching types, operands pairwise.
    fn cmp_generic(&mut self, lf: FuncId, li: &Instruction, rf: FuncId, ri: &Instruction) -> Decision {
        let shape_ok = match (&li.kind, &ri.kind) {
            (InstKind::Alloca { allocated: a }, InstKind::Alloca { allocated: b }) => {
                self.cmp_types(a, b).is_equal()
            }
            (InstKind::Load { .. }, InstKind::Load { .. })
            | (InstKind::Store { .. }, InstKind::Store { .. })
            | (InstKind::Select { .. }, InstKind::Select { .. }) => true,
            (InstKind::Cast { op: a, .. }, InstKind::Cast { op: b, .. }) => a == b,
            _ => false,
        };
        if !shape_ok || !self.cmp_types(&li.ty, &ri.ty).is_equal() {
            return Decision::NotEqual;
        }
        let ops_l = li.operands();
        let ops_r = ri.operands();
        if ops_l.len() != ops_r.len() {
            return Decision::NotEqual;
        }
        for (l, r) in ops_l.into_iter().zip(ops_r) {
            if !self.cmp_values(lf, rf, l, r).is_equal() {
                return Decision::NotEqual;
            }
        }
        Decision::Equal
    }

    fn cmp_binaries(&mut self, lf: FuncId, lid: InstId, rf: FuncId, rid: InstId) -> Decision {
        let li = self.mod_l.function(lf).inst(lid);
        let ri = self.mod_r.function(rf).inst(rid);
        let (InstKind::Binary {
            op: op_l,
            lhs: ll,
            rhs: lr,
        }, InstKind::Binary {
            op: op_r,
            lhs: rl,
            rhs: rr,
        }) = (&li.kind, &ri.kind) else {
            return Decision::NotEqual;
        };
        if op_l != op_r || !self.cmp_types(&li.ty, &ri.ty).is_equal() {
            return Decision::NotEqual;
        }

        let snap = self.sync.snapshot();
        if self.cmp_values(lf, rf, ll, rl).is_equal() && self.cmp_values(lf, rf, lr, rr).is_equal()
        {
            return Decision::Equal;
        }
        self.sync.restore(snap);

        if !op_l.is_commutative() {
            return Decision::NotEqual;
        }
        let snap = self.sync.snapshot();
        if self.cmp_values(lf, rf, ll, rr).is_equal() && self.cmp_values(lf, rf, lr, rl).is_equal()
        {
            return Decision::Equal;
        }
        self.sync.restore(snap);

        if !op_l.is_associative() {
            return Decision::NotEqual;
        }
        // Reorderable operator trees: compare leaves as unordered multisets.
        let left = self.collect_binary_operands(Side::L, lf, &Operand::Inst(lid), *op_l);
        let right = self.collect_binary_operands(Side::R, rf, &Operand::Inst(rid), *op_r);
        match (left, right) {
            (Some(a), Some(b)) if a == b => Decision::Equal,
            _ => Decision::NotEqual,
        }
    }

    /// Recursively collect operands of reorderable binary operators.
    /// Constants fold into one multiset, synchronized leaves into another
    /// keyed by sn. A non-synchronized non-constant leaf aborts.
    fn collect_binary_operands(
        &self,
        side: Side,
        func: FuncId,
        op: &Operand,
        opcode: semdiff_ir::BinaryOp,
    ) -> Option<(std::collections::BTreeMap<i128, usize>, std::collections::BTreeMap<u32, usize>)>
    {
        let mut consts = std::collections::BTreeMap::new();
        let mut sns = std::collections::BTreeMap::new();
        self.collect_binary_leaves(side, func, op, opcode, &mut consts, &mut sns)?;
        Some((consts, sns))
    }

    fn collect_binary_leaves(
        &self,
        side: Side,
        func: FuncId,
        op: &Operand,
        opcode: semdiff_ir::BinaryOp,
        consts: &mut std::collections::BTreeMap<i128, usize>,
        sns: &mut std::collections::BTreeMap<u32, usize>,
    ) -> Option<()> {
        let resolved = self.sync.resolve(side, RValue::from_operand(func, op));
        match resolved {
            RValue::Const(Constant::Int { value, .. }) => {
                *consts.entry(value).or_insert(0) += 1;
                Some(())
            }
            RValue::Const(_) => None,
            RValue::Ref(vref) => {
                if let Some(sn) = self.sync.sn_of(side, &vref) {
                    *sns.entry(sn).or_insert(0) += 1;
                    return Some(());
                }
                let ValueRef::Inst { func: f, inst } = vref else {
                    return None;
                };
                let inner = self.module_of(side).function(f).inst(inst);
                match &inner.kind {
                    InstKind::Binary { op, lhs, rhs } if *op == opcode => {
                        self.collect_binary_leaves(side, f, lhs, opcode, consts, sns)?;
                        self.collect_binary_leaves(side, f, rhs, opcode, consts, sns)
                    }
                    _ => None,
                }
            }
        }
    }

    fn cmp_cmps(&mut self, lf: FuncId, lid: InstId, rf: FuncId, rid: InstId) -> Decision {
        let li = self.mod_l.function(lf).inst(lid);
        let ri = self.mod_r.function(rf).inst(rid);
        let (InstKind::Cmp {
            pred: pl,
            lhs: ll,
            rhs: lr,
        }, InstKind::Cmp {
            pred: pr,
            lhs: rl,
            rhs: rr,
        }) = (&li.kind, &ri.kind) else {
            return Decision::NotEqual;
        };

        if pl == pr {
            if self.cmp_values(lf, rf, ll, rl).is_equal()
                && self.cmp_values(lf, rf, lr, rr).is_equal()
            {
                return Decision::Equal;
            }
            return Decision::NotEqual;
        }

        // Inverted predicate: tolerated when every user is a conditional
        // branch, whose successors are then compared swapped.
        if *pl == pr.inverse() {
            let snap = self.sync.snapshot();
            if self.cmp_values(lf, rf, ll, rl).is_equal()
                && self.cmp_values(lf, rf, lr, rr).is_equal()
                && Self::users_are_branches(self.mod_l.function(lf), lid)
                && Self::users_are_branches(self.mod_r.function(rf), rid)
            {
                self.sync
                    .note_inverse_cond(ValueRef::inst(lf, lid), ValueRef::inst(rf, rid));
                return Decision::Equal;
            }
            self.sync.restore(snap);
        }
        Decision::NotEqual
    }

    fn users_are_branches(func: &Function, id: InstId) -> bool {
        func.uses_of(id).iter().all(|site| match site {
            UseSite::Terminator(block) => func.block(*block).term.is_conditional(),
            UseSite::Inst(_) => false,
        })
    }

    fn cmp_geps(&mut self, lf: FuncId, lid: InstId, rf: FuncId, rid: InstId) -> Decision {
        let fl = self.mod_l.function(lf);
        let fr = self.mod_r.function(rf);
        let li = fl.inst(lid);
        let ri = fr.inst(rid);
        let (InstKind::Gep {
            source: sl,
            base: bl,
            indices: il,
        }, InstKind::Gep {
            source: sr,
            base: br,
            indices: ir,
        }) = (&li.kind, &ri.kind) else {
            return Decision::NotEqual;
        };

        if !self.cmp_values(lf, rf, bl, br).is_equal() {
            return Decision::NotEqual;
        }

        // Fast path: same source type, indices compared as values. Named
        // structs only qualify when their definitions still agree.
        let same_source = match (sl.struct_name(), sr.struct_name()) {
            (Some(a), Some(b)) => a == b && self.mod_l.struct_def(a) == self.mod_r.struct_def(b),
            _ => self.cmp_types(sl, sr).is_equal(),
        };
        if same_source && il.len() == ir.len() {
            let snap = self.sync.snapshot();
            if il
                .iter()
                .zip(ir)
                .all(|(a, b)| self.cmp_values(lf, rf, a, b).is_equal())
            {
                return Decision::Equal;
            }
            self.sync.restore(snap);
        }

        // Offsets computed per side with that side's layout rules.
        let off_l = gep_byte_offset(self.mod_l, fl, sl, il);
        let off_r = gep_byte_offset(self.mod_r, fr, sr, ir);
        if let (Some(a), Some(b)) = (off_l, off_r) {
            if a == b && sl.struct_name() == sr.struct_name() {
                return Decision::Equal;
            }
        }

        // Same-named struct whose definition changed: align field indices.
        if let (Some(name_l), Some(name_r)) = (sl.struct_name(), sr.struct_name()) {
            if name_l == name_r {
                let def_l = self.mod_l.struct_def(name_l);
                let def_r = self.mod_r.struct_def(name_r);
                if let (Some(def_l), Some(def_r)) = (def_l, def_r) {
                    if il.len() == ir.len()
                        && il.len() >= 2
                        && fold_constant(fl, &il[0]) == fold_constant(fr, &ir[0])
                        && self.align_struct_indices(def_l, def_r, fl, fr, &il[1..], &ir[1..])
                    {
                        trace!(name = name_l, "field indices aligned across struct change");
                        return Decision::Equal;
                    }
                }
            }
        }
        Decision::NotEqual
    }

    fn align_struct_indices(
        &self,
        def_l: &semdiff_ir::StructDef,
        def_r: &semdiff_ir::StructDef,
        fl: &Function,
        fr: &Function,
        rest_l: &[Operand],
        rest_r: &[Operand],
    ) -> bool {
        let (Some(first_l), Some(first_r)) = (rest_l.first(), rest_r.first()) else {
            return rest_l.is_empty() && rest_r.is_empty();
        };
        let (Some(idx_l), Some(idx_r)) = (fold_constant(fl, first_l), fold_constant(fr, first_r))
        else {
            return false;
        };
        let (Ok(idx_l), Ok(idx_r)) = (usize::try_from(idx_l), usize::try_from(idx_r)) else {
            return false;
        };
        let alignment = struct_field_alignment(def_l, def_r);
        if alignment.get(idx_l).copied().flatten() != Some(idx_r) {
            return false;
        }
        let (Some(tl), Some(tr)) = (def_l.fields.get(idx_l), def_r.fields.get(idx_r)) else {
            return false;
        };
        if rest_l.len() == 1 {
            return rest_r.len() == 1;
        }
        match (tl, tr) {
            (Type::Struct(nl), Type::Struct(nr)) => {
                let (Some(dl), Some(dr)) =
                    (self.mod_l.struct_def(nl), self.mod_r.struct_def(nr))
                else {
                    return false;
                };
                self.align_struct_indices(dl, dr, fl, fr, &rest_l[1..], &rest_r[1..])
            }
            _ => {
                // Remaining non-struct indices must match exactly.
                rest_l[1..]
                    .iter()
                    .zip(&rest_r[1..])
                    .all(|(a, b)| fold_constant(fl, a) == fold_constant(fr, b))
            }
        }
    }

    // ----- calls ----------------------------------------------------------

    fn cmp_calls(&mut self, lf: FuncId, lid: InstId, rf: FuncId, rid: InstId) -> Decision {
        let fl = self.mod_l.function(lf);
        let fr = self.mod_r.function(rf);
        let li = fl.inst(lid);
        let ri = fr.inst(rid);
        let (InstKind::Call {
            callee: cl,
            args: al,
        }, InstKind::Call {
            callee: cr,
            args: ar,
        }) = (&li.kind, &ri.kind) else {
            return Decision::NotEqual;
        };

        match (cl, cr) {
            (
                Callee::Asm {
                    text: tl,
                    constraints: kl,
                },
                Callee::Asm {
                    text: tr,
                    constraints: kr,
                },
            ) => {
                if tl != tr || kl != kr || al.len() != ar.len() {
                    return Decision::NotEqual;
                }
                self.cmp_operand_lists(lf, rf, al, ar)
            }
            (Callee::Symbol(nl), Callee::Symbol(nr)) => {
                if is_alloc_fn(nl) && is_alloc_fn(nr) {
                    match self.cmp_allocs(lf, lid, rf, rid) {
                        Decision::Defer => {}
                        decision => return decision,
                    }
                }
                if is_mem_fn(nl) && is_mem_fn(nr) && nl == nr {
                    return self.cmp_mem_call(lf, lid, rf, rid);
                }
                if !self.cmp_globals(nl, nr).is_equal() {
                    return Decision::NotEqual;
                }
                if !self.cmp_types(&li.ty, &ri.ty).is_equal() {
                    return Decision::NotEqual;
                }
                if al.len() == ar.len() {
                    self.cmp_operand_lists(lf, rf, al, ar)
                } else {
                    self.cmp_calls_with_extra_arg(lf, rf, al, ar)
                }
            }
            (Callee::Indirect(tl), Callee::Indirect(tr)) => {
                if !self.cmp_values(lf, rf, tl, tr).is_equal() || al.len() != ar.len() {
                    return Decision::NotEqual;
                }
                self.cmp_operand_lists(lf, rf, al, ar)
            }
            _ => Decision::NotEqual,
        }
    }

    fn cmp_operand_lists(
        &mut self,
        lf: FuncId,
        rf: FuncId,
        al: &[Operand],
        ar: &[Operand],
    ) -> Decision {
        for (a, b) in al.iter().zip(ar) {
            if !self.cmp_values(lf, rf, a, b).is_equal() {
                return Decision::NotEqual;
            }
        }
        Decision::Equal
    }

    /// Allocation calls: the requested byte size is normalized by each
    /// side's layout, absorbing struct growth and shrinkage. Defers to
    /// plain call comparison when the pair is not shaped like a matching
    /// allocation.
    fn cmp_allocs(&mut self, lf: FuncId, lid: InstId, rf: FuncId, rid: InstId) -> Decision {
        let fl = self.mod_l.function(lf);
        let fr = self.mod_r.function(rf);
        let li = fl.inst(lid);
        let ri = fr.inst(rid);
        let (InstKind::Call {
            callee: Callee::Symbol(nl),
            args: al,
        }, InstKind::Call {
            callee: Callee::Symbol(nr),
            args: ar,
        }) = (&li.kind, &ri.kind) else {
            return Decision::NotEqual;
        };
        if nl != nr || al.is_empty() || ar.is_empty() {
            return Decision::Defer;
        }

        let counted = COUNTED_ALLOC_FNS.contains(&nl.as_str());
        let tail = if counted { 2 } else { 1 };
        if al.len() < tail || ar.len() < tail {
            return Decision::Defer;
        }
        let size_of = |func: &Function, args: &[Operand]| -> Option<i128> {
            if counted {
                let count = fold_constant(func, args.first()?)?;
                let size = fold_constant(func, args.get(1)?)?;
                count.checked_mul(size)
            } else {
                fold_constant(func, args.first()?)
            }
        };
        let rest = self.cmp_operand_lists(
            lf,
            rf,
            al.get(tail..).unwrap_or(&[]),
            ar.get(tail..).unwrap_or(&[]),
        );
        if al.len() != ar.len() || !rest.is_equal() {
            return Decision::NotEqual;
        }

        match (size_of(fl, al), size_of(fr, ar)) {
            (Some(sl), Some(sr)) => {
                if sl == sr || self.sizes_match_some_struct(sl, sr) {
                    Decision::Equal
                } else {
                    Decision::NotEqual
                }
            }
            (None, None) => {
                // Sizes are not constant-foldable; compare them as values.
                self.cmp_operand_lists(lf, rf, &al[..tail], &ar[..tail])
            }
            _ => Decision::NotEqual,
        }
    }

    /// True when some struct defined on both sides has exactly these sizes
    /// under the respective layouts.
    fn sizes_match_some_struct(&self, sl: i128, sr: i128) -> bool {
        for def_l in &self.mod_l.structs {
            let Some(def_r) = self.mod_r.struct_def(&def_l.name) else {
                continue;
            };
            let left = self.mod_l.layout.struct_size(self.mod_l, def_l);
            let right = self.mod_r.layout.struct_size(self.mod_r, def_r);
            if left.map(i128::from) == Some(sl) && right.map(i128::from) == Some(sr) {
                return true;
            }
        }
        false
    }

    /// memset/memcpy-family calls: length operands are compared after
    /// constant folding.
    fn cmp_mem_call(&mut self, lf: FuncId, lid: InstId, rf: FuncId, rid: InstId) -> Decision {
        let fl = self.mod_l.function(lf);
        let fr = self.mod_r.function(rf);
        let li = fl.inst(lid);
        let ri = fr.inst(rid);
        let (InstKind::Call { args: al, .. }, InstKind::Call { args: ar, .. }) =
            (&li.kind, &ri.kind)
        else {
            return Decision::NotEqual;
        };
        if al.len() != ar.len() || al.is_empty() {
            return Decision::NotEqual;
        }
        let last = al.len() - 1;
        if !self
            .cmp_operand_lists(lf, rf, &al[..last], &ar[..last])
            .is_equal()
        {
            return Decision::NotEqual;
        }
        match (fold_constant(fl, &al[last]), fold_constant(fr, &ar[last])) {
            (Some(a), Some(b)) => {
                if a == b || self.sizes_match_some_struct(a, b) {
                    Decision::Equal
                } else {
                    Decision::NotEqual
                }
            }
            _ => self.cmp_values(lf, rf, &al[last], &ar[last]),
        }
    }

    /// A call with one additional trailing zero/null argument is equal to
    /// the call without it.
    fn cmp_calls_with_extra_arg(
        &mut self,
        lf: FuncId,
        rf: FuncId,
        al: &[Operand],
        ar: &[Operand],
    ) -> Decision {
        let (longer, shorter_len) = if al.len() == ar.len() + 1 {
            (al, ar.len())
        } else if ar.len() == al.len() + 1 {
            (ar, al.len())
        } else {
            return Decision::NotEqual;
        };
        let extra_ok = longer
            .last()
            .and_then(Operand::as_const)
            .is_some_and(Constant::is_zero_like);
        if !extra_ok {
            return Decision::NotEqual;
        }
        self.cmp_operand_lists(lf, rf, &al[..shorter_len], &ar[..shorter_len])
    }

    /// Additional handling when a call pair diverges: compare callees
    /// directly, then attempt a fully reversible inline substitution.
    fn process_call_difference(
        &mut self,
        bl: BlockId,
        br: BlockId,
        il: &mut usize,
        ir: &mut usize,
    ) -> bool {
        let fl = self.mod_l.function(self.func_l);
        let fr = self.mod_r.function(self.func_r);
        let lid = fl.block(bl).insts[*il];
        let rid = fr.block(br).insts[*ir];

        // Compare callees directly; they may otherwise have been skipped as
        // already failed elsewhere.
        if let (Some(nl), Some(nr)) = (fl.inst(lid).called_symbol(), fr.inst(rid).called_symbol())
        {
            let _ = self.cmp_globals(nl, nr);
        }

        for side in [Side::L, Side::R] {
            if self.try_inline(side, bl, br, il, ir) {
                return true;
            }
        }
        false
    }

    /// Speculatively substitute the call on `side` with its callee's body
    /// and compare in place. Restricted to single-block callees; any
    /// failure rolls back every mutation.
    fn try_inline(
        &mut self,
        side: Side,
        bl: BlockId,
        br: BlockId,
        il: &mut usize,
        ir: &mut usize,
    ) -> bool {
        let call_func_id = self.top_func_id(side);
        let call_func = self.module_of(side).function(call_func_id);
        let (call_block, call_pos) = match side {
            Side::L => (bl, *il),
            Side::R => (br, *ir),
        };
        let call_id = call_func.block(call_block).insts[call_pos];
        let call = call_func.inst(call_id);
        let Some(symbol) = call.called_symbol() else {
            return false;
        };
        if self.collab.orchestrator.in_progress(symbol) {
            return false;
        }
        let Some((callee_id, callee)) = self.module_of(side).function_by_name(symbol) else {
            return false;
        };
        if callee.is_declaration() || callee.blocks.len() != 1 {
            return false;
        }
        let InstKind::Call { args, .. } = &call.kind else {
            return false;
        };

        let other = side.other();
        let other_func_id = self.top_func_id(other);
        let other_func = self.module_of(other).function(other_func_id);
        let (other_block, other_start) = match other {
            Side::L => (bl, *il),
            Side::R => (br, *ir),
        };

        debug!(side = ?side, callee = symbol, "attempting speculative inline comparison");
        let sync_snap = self.sync.snapshot();
        let reloc_snap = self.reloc.clone();

        // Callee arguments resolve to the call-site operands.
        for (i, arg) in args.iter().enumerate() {
            let replacement = self
                .sync
                .resolve(side, RValue::from_operand(call_func_id, arg));
            self.sync.set_replacement(
                side,
                ValueRef::Arg {
                    func: callee_id,
                    index: u32::try_from(i).unwrap_or(u32::MAX),
                },
                replacement,
            );
        }

        let entry = BlockId(0);
        let body_len = callee.block(entry).insts.len();
        let other_insts = &other_func.block(other_block).insts;
        let mut bi = 0usize;
        let mut op = other_start;
        let matched = loop {
            if bi < body_len && self.may_skip(side, callee_id, entry, bi) {
                bi += 1;
                continue;
            }
            if bi >= body_len {
                break true;
            }
            if op >= other_insts.len() {
                break false;
            }
            let body_inst = callee.block(entry).insts[bi];
            let other_inst = other_insts[op];
            let snap = self.sync.snapshot();
            let decision = match side {
                Side::L => self.cmp_insts(callee_id, body_inst, other_func_id, other_inst),
                Side::R => self.cmp_insts(other_func_id, other_inst, callee_id, body_inst),
            };
            if decision.is_equal() {
                bi += 1;
                op += 1;
                continue;
            }
            self.sync.restore(snap);
            if self.may_skip(other, other_func_id, other_block, op) {
                op += 1;
                continue;
            }
            break false;
        };

        let matched = matched
            && match &callee.block(entry).term {
                Terminator::Ret(Some(value)) => {
                    let replacement = self
                        .sync
                        .resolve(side, RValue::from_operand(callee_id, value));
                    self.sync
                        .set_replacement(side, ValueRef::inst(call_func_id, call_id), replacement);
                    true
                }
                Terminator::Ret(None) => true,
                _ => false,
            };

        if matched {
            debug!(callee = symbol, "inline comparison succeeded");
            match side {
                Side::L => {
                    *il += 1;
                    *ir = op;
                }
                Side::R => {
                    *ir += 1;
                    *il = op;
                }
            }
            true
        } else {
            // Rollback must be complete; a partial rollback risks a false
            // equal verdict later.
            self.sync.restore(sync_snap);
            self.reloc = reloc_snap;
            false
        }
    }

    // ----- skip heuristics ------------------------------------------------

    /// Check if the instruction at `pos` can be skipped with no semantic
    /// effect, classifying it as skipped, ignored, or replaced.
    fn may_skip(&mut self, side: Side, func_id: FuncId, block: BlockId, pos: usize) -> bool {
        let module = self.module_of(side);
        let func = module.function(func_id);
        let id = func.block(block).insts[pos];
        let inst = func.inst(id);
        let vref = ValueRef::inst(func_id, id);

        match &inst.kind {
            InstKind::Cast { op, value } => {
                let elidable = *op == CastOp::Bitcast
                    || (self.config.control_flow_only && op.is_width_change());
                if elidable {
                    let replacement = self.sync.resolve(side, RValue::from_operand(func_id, value));
                    self.sync.set_replacement(side, vref, replacement);
                    trace!(side = ?side, inst = ?id, "cast elided");
                    return true;
                }
                false
            }
            InstKind::Load { ptr } => {
                if let Some(prev) = Self::find_previous_load(func, block, pos, ptr) {
                    let replacement = self
                        .sync
                        .resolve(side, RValue::Ref(ValueRef::inst(func_id, prev)));
                    self.sync.set_replacement(side, vref, replacement);
                    trace!(side = ?side, inst = ?id, "repetitive load replaced");
                    return true;
                }
                if self.has_ignored_root(side, func_id, func, ptr) {
                    if let Some(value) = Self::find_previous_store_value(func, block, pos, ptr) {
                        let replacement =
                            self.sync.resolve(side, RValue::from_operand(func_id, value));
                        self.sync.set_replacement(side, vref, replacement);
                    } else {
                        self.sync.mark_skipped(side, vref);
                    }
                    return true;
                }
                false
            }
            InstKind::Store { ptr, .. } => {
                if self.has_ignored_root(side, func_id, func, ptr) {
                    self.sync.mark_skipped(side, vref);
                    return true;
                }
                false
            }
            InstKind::Alloca { .. } => {
                if Self::all_users_access_only(func, id) {
                    self.sync.mark_ignored(side, vref);
                    trace!(side = ?side, inst = ?id, "extra local ignored");
                    return true;
                }
                false
            }
            InstKind::Binary { op, .. } => {
                if op.is_associative() && op.is_commutative() && Self::users_same_binop(func, id, *op)
                {
                    self.sync.mark_skipped(side, vref);
                    return true;
                }
                false
            }
            _ => false,
        }
    }

    /// Whether the pointer chain of `ptr` is rooted at an ignored alloca.
    fn has_ignored_root(
        &self,
        side: Side,
        func_id: FuncId,
        func: &Function,
        ptr: &Operand,
    ) -> bool {
        let loc = crate::reloc::memory_location(self.module_of(side), func, ptr);
        match loc.root {
            Operand::Inst(root) if loc.root_is_alloca => self
                .sync
                .is_ignored(side, &ValueRef::inst(func_id, root)),
            _ => false,
        }
    }

    /// Earlier load of the same pointer in this block with no intervening
    /// store or call.
    fn find_previous_load(
        func: &Function,
        block: BlockId,
        pos: usize,
        ptr: &Operand,
    ) -> Option<InstId> {
        let insts = &func.block(block).insts;
        for prev in insts[..pos].iter().rev() {
            let inst = func.inst(*prev);
            match &inst.kind {
                InstKind::Store { .. } | InstKind::Call { .. } => return None,
                InstKind::Load { ptr: prev_ptr } if prev_ptr == ptr => return Some(*prev),
                _ => {}
            }
        }
        None
    }

    /// Value most recently stored through `ptr` in this block, with no
    /// intervening call.
    fn find_previous_store_value<'f>(
        func: &'f Function,
        block: BlockId,
        pos: usize,
        ptr: &Operand,
    ) -> Option<&'f Operand> {
        let insts = &func.block(block).insts;
        for prev in insts[..pos].iter().rev() {
            let inst = func.inst(*prev);
            match &inst.kind {
                InstKind::Call { .. } => return None,
                InstKind::Store {
                    value,
                    ptr: store_ptr,
                } if store_ptr == ptr => return Some(value),
                _ => {}
            }
        }
        None
    }

    /// All users of the alloca are loads from it or stores to it.
    fn all_users_access_only(func: &Function, id: InstId) -> bool {
        func.uses_of(id).iter().all(|site| match site {
            UseSite::Inst(user) => match &func.inst(*user).kind {
                InstKind::Load { ptr } => *ptr == Operand::Inst(id),
                InstKind::Store { ptr, value } => {
                    *ptr == Operand::Inst(id) && *value != Operand::Inst(id)
                }
                _ => false,
            },
            UseSite::Terminator(_) => false,
        })
    }

    /// All users are binary operators of the same reorderable kind.
    fn users_same_binop(func: &Function, id: InstId, opcode: semdiff_ir::BinaryOp) -> bool {
        let uses = func.uses_of(id);
        !uses.is_empty()
            && uses.iter().all(|site| match site {
                UseSite::Inst(user) => {
                    matches!(&func.inst(*user).kind, InstKind::Binary { op, .. } if *op == opcode)
                }
                UseSite::Terminator(_) => false,
            })
    }

    // ----- values, types, constants, globals ------------------------------

    /// Compare two operands after replacement resolution.
    pub(crate) fn cmp_values(&mut self, lf: FuncId, rf: FuncId, l: &Operand, r: &Operand) -> Decision {
        let lv = self.sync.resolve(Side::L, RValue::from_operand(lf, l));
        let rv = self.sync.resolve(Side::R, RValue::from_operand(rf, r));
        match (&lv, &rv) {
            (RValue::Const(a), RValue::Const(b)) => self.cmp_constants(a, b),
            (RValue::Ref(ValueRef::Global(a)), RValue::Ref(ValueRef::Global(b))) => {
                self.cmp_globals(a, b)
            }
            (RValue::Ref(a), RValue::Ref(b)) => {
                if self.sync.is_ignored(Side::L, a) || self.sync.is_ignored(Side::R, b) {
                    return Decision::NotEqual;
                }
                // A skipped value has no settled counterpart yet and must
                // not be paired through a fresh sn.
                if self.sync.is_skipped(Side::L, a) || self.sync.is_skipped(Side::R, b) {
                    return Decision::NotEqual;
                }
                if self.sync.is_assumed_equal(a, b) {
                    return Decision::Equal;
                }
                self.sync.map_values(a.clone(), b.clone())
            }
            _ => Decision::NotEqual,
        }
    }

    /// Value comparison with recursive descent into unmapped defining
    /// instructions, guarded by the assumed-equal stack. Used for deferred
    /// PHI operands, where lockstep order gives no mapping guarantee.
    fn cmp_values_rec(&mut self, lf: FuncId, rf: FuncId, l: &Operand, r: &Operand) -> Decision {
        let lv = self.sync.resolve(Side::L, RValue::from_operand(lf, l));
        let rv = self.sync.resolve(Side::R, RValue::from_operand(rf, r));
        if let (RValue::Ref(a), RValue::Ref(b)) = (&lv, &rv) {
            if self.sync.is_assumed_equal(a, b) {
                return Decision::Equal;
            }
            if let (
                ValueRef::Inst { func: af, inst: ai },
                ValueRef::Inst { func: bf, inst: bi },
            ) = (a, b)
            {
                if self.sync.sn_of(Side::L, a).is_none() && self.sync.sn_of(Side::R, b).is_none() {
                    self.sync.assume_equal(a.clone(), b.clone());
                    let decision = self.cmp_insts(*af, *ai, *bf, *bi);
                    self.sync.pop_assumed();
                    return decision;
                }
            }
        }
        self.cmp_values(lf, rf, l, r)
    }

    fn cmp_constants(&self, l: &Constant, r: &Constant) -> Decision {
        match (l, r) {
            (
                Constant::Int {
                    value: a,
                    bits: ab,
                },
                Constant::Int {
                    value: b,
                    bits: bb,
                },
            ) => {
                // In control-flow-only mode the bit width is ignored,
                // absorbing extension/truncation artifacts.
                if a == b && (ab == bb || self.config.control_flow_only) {
                    Decision::Equal
                } else {
                    Decision::NotEqual
                }
            }
            (
                Constant::Float {
                    value: a,
                    bits: ab,
                },
                Constant::Float {
                    value: b,
                    bits: bb,
                },
            ) => {
                if a.to_bits() == b.to_bits() && ab == bb {
                    Decision::Equal
                } else {
                    Decision::NotEqual
                }
            }
            (Constant::Null, Constant::Null) => Decision::Equal,
            (Constant::Undef(a), Constant::Undef(b)) => self.cmp_types(a, b),
            _ => Decision::NotEqual,
        }
    }

    /// Compare types; the left type belongs to the left module and the
    /// right type to the right module.
    fn cmp_types(&self, l: &Type, r: &Type) -> Decision {
        if self.config.control_flow_only {
            if l.is_int() && r.is_int() {
                return Decision::Equal;
            }
            if let (Type::Array { elem: a, .. }, Type::Array { elem: b, .. }) = (l, r) {
                return self.cmp_types(a, b);
            }
            // A union compares equal to any of its member types (all
            // members sit at byte offset zero).
            if let Type::Struct(name) = l {
                if let Some(def) = self.mod_l.struct_def(name) {
                    if def.is_union && def.has_member(r) {
                        return Decision::Equal;
                    }
                }
            }
            if let Type::Struct(name) = r {
                if let Some(def) = self.mod_r.struct_def(name) {
                    if def.is_union && def.has_member(l) {
                        return Decision::Equal;
                    }
                }
            }
        }
        if l == r {
            Decision::Equal
        } else {
            Decision::NotEqual
        }
    }

    /// Cross-module global identity: declared name, with function verdicts
    /// taken from the orchestrator when available.
    fn cmp_globals(&self, l: &str, r: &str) -> Decision {
        if l != r {
            return Decision::NotEqual;
        }
        let is_function =
            self.mod_l.function_by_name(l).is_some() && self.mod_r.function_by_name(r).is_some();
        if is_function {
            if self.collab.orchestrator.in_progress(l) {
                // A pair already being compared is assumed equal to break
                // recursion; the outer comparison settles it.
                return Decision::Equal;
            }
            match self.collab.orchestrator.cached_verdict(l) {
                Some(Verdict::Equal) | None => return Decision::Equal,
                Some(Verdict::NotEqual) => return Decision::NotEqual,
            }
        }
        Decision::Equal
    }

    // ----- PHIs -----------------------------------------------------------

    /// Compare two PHI nodes once the predecessor block mapping is settled.
    fn cmp_phis(&mut self, lf: FuncId, lid: InstId, rf: FuncId, rid: InstId) -> Decision {
        let fl = self.mod_l.function(lf);
        let fr = self.mod_r.function(rf);
        let li = fl.inst(lid);
        let ri = fr.inst(rid);
        let (InstKind::Phi { incoming: inc_l }, InstKind::Phi { incoming: inc_r }) =
            (&li.kind, &ri.kind)
        else {
            return Decision::NotEqual;
        };
        if inc_l.len() != inc_r.len() || !self.cmp_types(&li.ty, &ri.ty).is_equal() {
            return Decision::NotEqual;
        }

        let lref = ValueRef::inst(lf, lid);
        let rref = ValueRef::inst(rf, rid);
        self.coverage.compared_left += 1;
        self.coverage.compared_right += 1;
        self.sync.assume_equal(lref.clone(), rref.clone());
        let mut ok = true;
        for (value_l, pred_l) in inc_l {
            let Some(pred_r) = self.block_map_l.get(pred_l).copied() else {
                ok = false;
                break;
            };
            let Some((value_r, _)) = inc_r.iter().find(|(_, block)| *block == pred_r) else {
                ok = false;
                break;
            };
            if !self.cmp_values_rec(lf, rf, value_l, value_r).is_equal() {
                ok = false;
                break;
            }
        }
        self.sync.pop_assumed();

        if ok {
            self.sync.map_values(lref.clone(), rref.clone());
            self.sync.note_equal(lref, rref);
            self.coverage.matched += 1;
            Decision::Equal
        } else {
            Decision::NotEqual
        }
    }

    // ----- terminators ----------------------------------------------------

    /// Compare block terminators structurally and yield the successor pairs
    /// to walk next.
    fn cmp_terminators(
        &mut self,
        bl: BlockId,
        br: BlockId,
    ) -> Result<Vec<(BlockId, BlockId)>, ()> {
        let fl = self.mod_l.function(self.func_l);
        let fr = self.mod_r.function(self.func_r);
        let tl = &fl.block(bl).term;
        let tr = &fr.block(br).term;
        match (tl, tr) {
            (Terminator::Ret(None), Terminator::Ret(None))
            | (Terminator::Unreachable, Terminator::Unreachable) => Ok(Vec::new()),
            (Terminator::Ret(Some(a)), Terminator::Ret(Some(b))) => {
                if self.cmp_values(self.func_l, self.func_r, a, b).is_equal() {
                    Ok(Vec::new())
                } else {
                    self.record_terminator_divergence(bl, br);
                    Err(())
                }
            }
            (Terminator::Br(a), Terminator::Br(b)) => Ok(vec![(*a, *b)]),
            (
                Terminator::CondBr {
                    cond: cl,
                    on_true: lt,
                    on_false: lf_,
                },
                Terminator::CondBr {
                    cond: cr,
                    on_true: rt,
                    on_false: rf_,
                },
            ) => {
                if !self.cmp_values(self.func_l, self.func_r, cl, cr).is_equal() {
                    self.record_terminator_divergence(bl, br);
                    return Err(());
                }
                let lref = self
                    .sync
                    .resolve(Side::L, RValue::from_operand(self.func_l, cl));
                let rref = self
                    .sync
                    .resolve(Side::R, RValue::from_operand(self.func_r, cr));
                let inverted = match (lref.as_ref(), rref.as_ref()) {
                    (Some(a), Some(b)) => self.sync.is_inverse_cond(a, b),
                    _ => false,
                };
                if inverted {
                    Ok(vec![(*lt, *rf_), (*lf_, *rt)])
                } else {
                    Ok(vec![(*lt, *rt), (*lf_, *rf_)])
                }
            }
            (
                Terminator::Switch {
                    value: vl,
                    default: dl,
                    cases: cl,
                },
                Terminator::Switch {
                    value: vr,
                    default: dr,
                    cases: cr,
                },
            ) => {
                if !self.cmp_values(self.func_l, self.func_r, vl, vr).is_equal()
                    || cl.len() != cr.len()
                {
                    self.record_terminator_divergence(bl, br);
                    return Err(());
                }
                // Case order is not significant; compare as sorted sets.
                let mut sorted_l: Vec<_> = cl.clone();
                let mut sorted_r: Vec<_> = cr.clone();
                sorted_l.sort_by_key(|(value, _)| *value);
                sorted_r.sort_by_key(|(value, _)| *value);
                let mut pairs = vec![(*dl, *dr)];
                for ((val_l, target_l), (val_r, target_r)) in sorted_l.iter().zip(&sorted_r) {
                    if val_l != val_r {
                        self.record_terminator_divergence(bl, br);
                        return Err(());
                    }
                    pairs.push((*target_l, *target_r));
                }
                Ok(pairs)
            }
            _ => {
                self.record_terminator_divergence(bl, br);
                Err(())
            }
        }
    }

    // ----- divergence recording -------------------------------------------

    fn record_inst_divergence(&mut self, left: Option<InstId>, right: Option<InstId>) {
        if self.divergence.is_some() {
            return;
        }
        let fl = self.mod_l.function(self.func_l);
        let fr = self.mod_r.function(self.func_r);
        let left_loc = left.and_then(|id| self.collab.debug_info.location_of(fl, id));
        let right_loc = right.and_then(|id| self.collab.debug_info.location_of(fr, id));
        debug!(?left, ?right, "divergence located");
        self.divergence = Some(DivergenceRecord {
            point: DivergencePoint::Insts { left, right },
            left_loc,
            right_loc,
        });
    }

    fn record_terminator_divergence(&mut self, left: BlockId, right: BlockId) {
        if self.divergence.is_some() {
            return;
        }
        debug!(?left, ?right, "terminator divergence");
        self.divergence = Some(DivergenceRecord {
            point: DivergencePoint::Terminators { left, right },
            left_loc: None,
            right_loc: None,
        });
    }

    pub(crate) fn synchronize_pair(&mut self, l: ValueRef, r: ValueRef) -> Decision {
        let decision = self.sync.map_values(l.clone(), r.clone());
        if decision.is_equal() {
            self.sync.note_equal(l, r);
            self.coverage.matched += 1;
        }
        decision
    }
}
