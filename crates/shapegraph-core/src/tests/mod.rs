/*! Unit coverage for the unification engine.
 *
 * Merges, collapses and array folding interact in ways that single-operation tests miss. These
 * tests build small graphs the way a driving analysis would and check what each alias class looks
 * like afterwards.
 */

mod array_tests;
