//! Post-hoc diagnosis: explain a diverging instruction pair as a
//! source-level artifact, or rescue it through a registered pattern.

use tracing::debug;

use semdiff_ir::{BlockId, Callee, InstKind};

use crate::comparator::FunctionComparator;
use crate::heuristics::normalize_asm;
use crate::report::{Diagnostic, DiagnosticKind};
use crate::sync::ValueRef;

impl FunctionComparator<'_> {
    /// Last-resort handling of a diverging pair. Returns true when the
    /// divergence was absorbed and the walk can continue; otherwise leaves
    /// behind diagnostics explaining the difference. Explanations are tried
    /// in a fixed order and the first that applies settles the pair: asm,
    /// then macro, then type, then registered patterns.
    pub(crate) fn try_explain(
        &mut self,
        bl: BlockId,
        br: BlockId,
        il: &mut usize,
        ir: &mut usize,
    ) -> bool {
        if let Some(absorbed) = self.try_asm_difference(bl, br, il, ir) {
            return absorbed;
        }
        if self.note_macro_function_difference(bl, br, *il, *ir) {
            return false;
        }
        if self.note_type_difference(bl, br, *il, *ir) {
            return false;
        }
        self.try_pattern(bl, br, il, ir)
    }

    /// Apply a registered multi-instruction equivalence pattern at the
    /// current cursors.
    fn try_pattern(&mut self, bl: BlockId, br: BlockId, il: &mut usize, ir: &mut usize) -> bool {
        let fl = self.mod_l.function(self.func_l);
        let fr = self.mod_r.function(self.func_r);
        let Some(found) = self
            .collab
            .patterns
            .try_match(fl, bl, *il, fr, br, *ir)
        else {
            return false;
        };
        if found.left_span == 0 && found.right_span == 0 {
            return false;
        }
        let snap = self.sync.snapshot();
        for (l, r) in &found.value_pairs {
            let decision = self.synchronize_pair(
                ValueRef::inst(self.func_l, *l),
                ValueRef::inst(self.func_r, *r),
            );
            if !decision.is_equal() {
                self.sync.restore(snap);
                return false;
            }
        }
        debug!(
            left_span = found.left_span,
            right_span = found.right_span,
            "pattern absorbed instruction region"
        );
        self.coverage.compared_left += u32::try_from(found.left_span).unwrap_or(u32::MAX);
        self.coverage.compared_right += u32::try_from(found.right_span).unwrap_or(u32::MAX);
        *il += found.left_span;
        *ir += found.right_span;
        true
    }

    /// Inline-assembly pair whose text differs. Differences limited to
    /// register choice and spacing are tolerated with a diagnostic
    /// (`Some(true)`); real differences produce a diagnostic and keep the
    /// divergence (`Some(false)`). `None` when the pair is not asm/asm.
    fn try_asm_difference(
        &mut self,
        bl: BlockId,
        br: BlockId,
        il: &mut usize,
        ir: &mut usize,
    ) -> Option<bool> {
        let fl = self.mod_l.function(self.func_l);
        let fr = self.mod_r.function(self.func_r);
        let lid = fl.block(bl).insts[*il];
        let rid = fr.block(br).insts[*ir];
        let (
            InstKind::Call {
                callee:
                    Callee::Asm {
                        text: tl,
                        constraints: kl,
                    },
                args: al,
            },
            InstKind::Call {
                callee:
                    Callee::Asm {
                        text: tr,
                        constraints: kr,
                    },
                args: ar,
            },
        ) = (&fl.inst(lid).kind, &fr.inst(rid).kind)
        else {
            return None;
        };
        let loc = self.collab.debug_info.location_of(fl, lid);

        if normalize_asm(tl) == normalize_asm(tr) && kl == kr && al.len() == ar.len() {
            let snap = self.sync.snapshot();
            let args_equal = al
                .iter()
                .zip(ar)
                .all(|(a, b)| self.cmp_values(self.func_l, self.func_r, a, b).is_equal());
            if args_equal {
                let _ = self.synchronize_pair(
                    ValueRef::inst(self.func_l, lid),
                    ValueRef::inst(self.func_r, rid),
                );
                self.diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::AsmDiff,
                    function: fl.name.clone(),
                    loc,
                    detail: "inline assembly differs only in register choice or spacing"
                        .to_string(),
                });
                *il += 1;
                *ir += 1;
                return Some(true);
            }
            self.sync.restore(snap);
        }
        self.diagnostics.push(Diagnostic {
            kind: DiagnosticKind::AsmDiff,
            function: fl.name.clone(),
            loc,
            detail: format!("inline assembly differs: `{tl}` vs `{tr}`"),
        });
        Some(false)
    }

    /// A function call on one side matched by a macro expansion of the same
    /// name on the other. Returns true when the diagnostic applied.
    fn note_macro_function_difference(
        &mut self,
        bl: BlockId,
        br: BlockId,
        il: usize,
        ir: usize,
    ) -> bool {
        let fl = self.mod_l.function(self.func_l);
        let fr = self.mod_r.function(self.func_r);
        let lid = fl.block(bl).insts[il];
        let rid = fr.block(br).insts[ir];

        if let Some(symbol) = fl.inst(lid).called_symbol() {
            let expanded = self
                .collab
                .debug_info
                .enclosing_macro(fr, rid)
                .is_some_and(|name| name == symbol);
            if expanded {
                self.diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::MacroDiff,
                    function: fl.name.clone(),
                    loc: self.collab.debug_info.location_of(fl, lid),
                    detail: format!("`{symbol}` is a function call here and a macro expansion on the other side"),
                });
                return true;
            }
        }
        if let Some(symbol) = fr.inst(rid).called_symbol() {
            let expanded = self
                .collab
                .debug_info
                .enclosing_macro(fl, lid)
                .is_some_and(|name| name == symbol);
            if expanded {
                self.diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::MacroDiff,
                    function: fl.name.clone(),
                    loc: self.collab.debug_info.location_of(fr, rid),
                    detail: format!("`{symbol}` is a macro expansion here and a function call on the other side"),
                });
                return true;
            }
        }
        false
    }

    /// Both sides address a struct of the same name whose definition
    /// changed between versions. Returns true when the diagnostic applied.
    fn note_type_difference(&mut self, bl: BlockId, br: BlockId, il: usize, ir: usize) -> bool {
        let fl = self.mod_l.function(self.func_l);
        let fr = self.mod_r.function(self.func_r);
        let lid = fl.block(bl).insts[il];
        let rid = fr.block(br).insts[ir];
        let (
            InstKind::Gep { source: sl, .. },
            InstKind::Gep { source: sr, .. },
        ) = (&fl.inst(lid).kind, &fr.inst(rid).kind)
        else {
            return false;
        };
        let (Some(name_l), Some(name_r)) = (sl.struct_name(), sr.struct_name()) else {
            return false;
        };
        if name_l != name_r {
            return false;
        }
        let (Some(def_l), Some(def_r)) = (
            self.mod_l.struct_def(name_l),
            self.mod_r.struct_def(name_r),
        ) else {
            return false;
        };
        if def_l != def_r {
            self.diagnostics.push(Diagnostic {
                kind: DiagnosticKind::TypeDiff,
                function: fl.name.clone(),
                loc: self.collab.debug_info.location_of(fl, lid),
                detail: format!("definition of struct `{name_l}` changed between versions"),
            });
            return true;
        }
        false
    }
}
